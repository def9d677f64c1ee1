mod rasterization;
mod serialization;

pub use rasterization::ZoneRasterizer;
pub use serialization::{
    RECORD_INDEX_WIDTH, binary_format, deserialize, serialize, serialize_values, write_to_file,
};

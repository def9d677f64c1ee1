mod zonal_statistics;

pub use zonal_statistics::{ZonalStatistics, check_inputs, run_zonal_statistics};

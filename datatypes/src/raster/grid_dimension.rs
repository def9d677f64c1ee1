use serde::{Deserialize, Serialize};

/// The shape of a two dimensional grid as `[height, width]` ~ `[rows, cols]`.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct GridShape2D {
    pub shape_array: [usize; 2],
}

impl GridShape2D {
    pub fn new(shape_array: [usize; 2]) -> Self {
        Self { shape_array }
    }

    pub fn new_2d(height: usize, width: usize) -> Self {
        Self::new([height, width])
    }

    pub fn axis_size_y(&self) -> usize {
        self.shape_array[0]
    }

    pub fn axis_size_x(&self) -> usize {
        self.shape_array[1]
    }

    pub fn number_of_elements(&self) -> usize {
        self.shape_array[0] * self.shape_array[1]
    }

    pub fn is_empty(&self) -> bool {
        self.number_of_elements() == 0
    }
}

impl From<[usize; 2]> for GridShape2D {
    fn from(shape_array: [usize; 2]) -> Self {
        Self::new(shape_array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_shape_2d() {
        let shape = GridShape2D::new_2d(3, 4);
        assert_eq!(shape.axis_size_y(), 3);
        assert_eq!(shape.axis_size_x(), 4);
        assert_eq!(shape.number_of_elements(), 12);
        assert!(!shape.is_empty());
        assert!(GridShape2D::new_2d(0, 4).is_empty());
    }
}

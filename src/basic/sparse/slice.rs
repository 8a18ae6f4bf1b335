use nalgebra::*;
use nalgebra_sparse::{CooMatrix, CscMatrix};

/// Rectangular block of shape `shape` starting at `start_pos`.
#[inline(always)]
pub fn slice_csc_matrix_block<T: Clone + Scalar + ClosedAddAssign + num_traits::Zero>(
    mat: &CscMatrix<T>,
    start_pos: (usize, usize),
    shape: (usize, usize),
) -> CscMatrix<T> {
    let (start_row, start_col) = start_pos;
    let (end_row, end_col) = (shape.0 + start_row, shape.1 + start_col);

    let mut coo = CooMatrix::new(shape.0, shape.1);
    mat.triplet_iter()
        .filter(|(r, c, _)| *r >= start_row && *r < end_row && *c >= start_col && *c < end_col)
        .for_each(|(r, c, v)| coo.push(r - start_row, c - start_col, v.clone()));
    CscMatrix::from(&coo)
}

/// Block access used when assembling the Newton Jacobian.
pub(crate) trait Slice {
    type Mat;
    fn block(&self, start_pos: (usize, usize), shape: (usize, usize)) -> Self::Mat;
    /// Column range `start_col..end_col` over all rows.
    fn columns(&self, start_col: usize, end_col: usize) -> Self::Mat;
}

impl<T: Clone + num_traits::Zero + Scalar + ClosedAddAssign> Slice for CscMatrix<T> {
    type Mat = CscMatrix<T>;
    #[inline(always)]
    fn block(&self, start_pos: (usize, usize), shape: (usize, usize)) -> Self::Mat {
        slice_csc_matrix_block(self, start_pos, shape)
    }
    #[inline(always)]
    fn columns(&self, start_col: usize, end_col: usize) -> Self::Mat {
        slice_csc_matrix_block(self, (0, start_col), (self.nrows(), end_col - start_col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_and_columns() {
        let dense = DMatrix::from_row_slice(3, 3, &[1.0, 2.0, 0.0, 0.0, 5.0, 6.0, 7.0, 0.0, 9.0]);
        let sp = CscMatrix::from(&dense);
        let block = DMatrix::from(&sp.block((1, 1), (2, 2)));
        assert_eq!(block, DMatrix::from_row_slice(2, 2, &[5.0, 6.0, 0.0, 9.0]));
        let top = DMatrix::from(&sp.block((0, 0), (1, 3)));
        assert_eq!(top, dense.rows(0, 1).into_owned());
        let cols = DMatrix::from(&sp.columns(1, 3));
        assert_eq!(cols, dense.columns(1, 2).into_owned());
    }
}

use nalgebra_sparse::{CscMatrix, pattern::SparsityPattern};

/// Concatenates matrices along their major (column) dimension.
///
/// All inputs must share the same number of rows.
pub fn csc_hstack<T: Clone>(matrices: &[&CscMatrix<T>]) -> CscMatrix<T> {
    let nrows = matrices[0].nrows();
    let ncols: usize = matrices.iter().map(|m| m.ncols()).sum();
    let nnz: usize = matrices.iter().map(|m| m.nnz()).sum();

    let mut data: Vec<T> = Vec::with_capacity(nnz);
    let mut indices: Vec<usize> = Vec::with_capacity(nnz);
    let mut indptr: Vec<usize> = Vec::with_capacity(ncols + 1);
    let mut current_offset = 0;
    for mat in matrices {
        assert_eq!(mat.nrows(), nrows, "All matrices must have the same number of rows");
        let offsets = mat.col_offsets();
        indptr.extend(offsets[..mat.ncols()].iter().map(|x| x + current_offset));
        indices.extend_from_slice(mat.row_indices());
        data.extend_from_slice(mat.values());
        current_offset += mat.nnz();
    }
    indptr.push(nnz);
    build(ncols, nrows, indptr, indices, data)
}

/// Concatenates matrices along their minor (row) dimension.
///
/// All inputs must share the same number of columns.
pub fn csc_vstack<T: Clone>(matrices: &[&CscMatrix<T>]) -> CscMatrix<T> {
    let ncols = matrices[0].ncols();
    let nrows: usize = matrices.iter().map(|m| m.nrows()).sum();
    let nnz: usize = matrices.iter().map(|m| m.nnz()).sum();

    let mut data: Vec<T> = Vec::with_capacity(nnz);
    let mut indices: Vec<usize> = Vec::with_capacity(nnz);
    let mut indptr: Vec<usize> = vec![0; ncols + 1];
    for mat in matrices {
        assert_eq!(mat.ncols(), ncols, "All matrices must have the same number of cols");
    }
    for col in 0..ncols {
        let mut row_offset = 0;
        let mut count = 0;
        for mat in matrices {
            let (start, end) = (mat.col_offsets()[col], mat.col_offsets()[col + 1]);
            data.extend_from_slice(&mat.values()[start..end]);
            indices.extend(mat.row_indices()[start..end].iter().map(|x| x + row_offset));
            row_offset += mat.nrows();
            count += end - start;
        }
        indptr[col + 1] = indptr[col] + count;
    }
    build(ncols, nrows, indptr, indices, data)
}

fn build<T>(
    ncols: usize,
    nrows: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<T>,
) -> CscMatrix<T> {
    // offsets and indices are copied from valid matrices, so the pattern is valid
    let pattern = unsafe {
        SparsityPattern::from_offset_and_indices_unchecked(ncols, nrows, indptr, indices)
    };
    CscMatrix::try_from_pattern_and_values(pattern, data).expect("nnz matches pattern")
}

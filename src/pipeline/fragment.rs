/// Size of each slice when `len` bytes are cut into `count` pieces
pub fn slice_size(len: usize, count: usize) -> usize {
    if count == 0 {
        return len;
    }
    (len + count - 1) / count
}

/// Cut data into exactly `count` contiguous slices of `ceil(len / count)` bytes.
/// Once the data runs out the remaining slices are empty.
pub fn fragment_data(data: &[u8], count: usize) -> Vec<&[u8]> {
    let size = slice_size(data.len(), count);

    (0..count)
        .map(|i| {
            let start = (i * size).min(data.len());
            let end = (start + size).min(data.len());
            &data[start..end]
        })
        .collect()
}

/// Join slices back together in the order given
pub fn unfragment<S: AsRef<[u8]>>(slices: &[S]) -> Vec<u8> {
    let mut out = Vec::with_capacity(slices.iter().map(|s| s.as_ref().len()).sum());
    for slice in slices {
        out.extend_from_slice(slice.as_ref());
    }
    out
}

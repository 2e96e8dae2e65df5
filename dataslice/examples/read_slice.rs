//! Lazily read windows of a dataset written by the write example

use dataslice::{LazyDataset, Result, SliceSpec};
use std::time::Instant;

fn main() -> Result<()> {
    let dataset = LazyDataset::from_file("example_frame.dslc")?;
    println!(
        "Opened '{}': physical shape {:?}, type {}",
        dataset.name(),
        dataset.physical_shape(),
        dataset.data_type()
    );

    // A small window out of the center
    let slice = SliceSpec::new(
        dataset.logical_shape(),
        vec![192, 192],
        vec![1, 1],
        vec![4, 4],
    )?;
    let start = Instant::now();
    let window = dataset.read_slice(&slice)?;
    println!("Read {:?} window in {:?}", window.shape(), start.elapsed());
    for row in 0..4 {
        let values: Vec<f64> = (0..4)
            .map(|col| window.data().get_f64(&[row, col]).unwrap_or(f64::NAN))
            .collect();
        println!("  {values:?}");
    }

    // Every second row and column of the whole frame
    let slice = SliceSpec::new(
        dataset.logical_shape(),
        vec![0, 0],
        vec![2, 2],
        vec![256, 256],
    )?;
    let start = Instant::now();
    let decimated = dataset.read_slice(&slice)?;
    println!(
        "Read decimated {:?} view in {:?}",
        decimated.shape(),
        start.elapsed()
    );
    Ok(())
}

//! Create a dataset file and write a window into it

use dataslice::{DataType, DynamicArray, LazyWriter, Result, SliceSpec};
use ndarray::{ArrayD, IxDyn};
use std::time::Instant;

fn main() -> Result<()> {
    println!("Creating a 512 x 512 detector frame dataset...");

    let writer = LazyWriter::new("example_frame.dslc", "/frame", vec![512, 512], DataType::F64)
        .with_fill(-1.0);

    let start = Instant::now();
    writer.initialize()?;
    println!("Node initialized in {:?}", start.elapsed());

    // Write a 128 x 128 hot region into the center of the frame
    let slice = SliceSpec::new(
        &[512, 512],
        vec![192, 192],
        vec![1, 1],
        vec![128, 128],
    )?;
    let values: Vec<f64> = (0..128 * 128).map(|i| (i % 100) as f64).collect();
    let region = ArrayD::from_shape_vec(IxDyn(&[128, 128]), values)
        .expect("region shape matches value count");

    let start = Instant::now();
    writer.write_slice(&slice, &DynamicArray::from(region))?;
    println!("Region written in {:?}", start.elapsed());
    println!("\nRun 'cargo run --example read_slice' to read it back!");
    Ok(())
}

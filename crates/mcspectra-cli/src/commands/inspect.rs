use std::path::Path;

use mcspectra_core::{ArrayStore, DirStore, StoreError};

pub fn run(root: &Path, prefix: Option<&str>) -> mcspectra_core::Result<()> {
    if !root.is_dir() {
        return Err(StoreError::NotFound(root.display().to_string()).into());
    }
    let store = DirStore::open(root)?;
    let datasets = store.list_datasets(prefix.unwrap_or(""))?;
    if datasets.is_empty() {
        println!("No datasets under {}", root.display());
        return Ok(());
    }

    let width = datasets.iter().map(String::len).max().unwrap_or(0);
    for path in &datasets {
        let shape = store.shape(path)?;
        let dims: Vec<String> = shape.iter().map(usize::to_string).collect();
        println!("{path:<width$}  ({})", dims.join(", "));
    }
    println!("\n{} dataset(s)", datasets.len());
    Ok(())
}

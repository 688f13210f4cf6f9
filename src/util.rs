use crate::error::ServiceError;
use crate::model::PairKey;
use crate::scorer::write_pairs;
use rustc_hash::FxHashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

pub fn create_output(path: &Path) -> Result<BufWriter<File>, ServiceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.is_dir() {
            return Err(ServiceError::not_found(format!(
                "output directory {} does not exist",
                parent.display()
            )));
        }
    }
    File::create(path).map(BufWriter::new).map_err(|err| {
        ServiceError::not_found(format!("could not write to file {}: {}", path.display(), err))
    })
}

pub fn push_result_file(path: &Path, pairs: &FxHashSet<PairKey>) -> Result<(), ServiceError> {
    write_pairs(pairs, create_output(path)?)?;
    info!(path = %path.display(), pairs = pairs.len(), "Result file written");
    Ok(())
}

// ============================================================================
// IO — pipeline persistence (JSON) and PNG export
// ============================================================================

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::canvas::ImagePair;
use crate::error::{Error, Result};
use crate::log_info;
use crate::ops::{OpContext, OpKind};
use crate::params::Parameters;
use crate::pipeline::OperationStack;
use crate::sprites::SpriteRepository;

/// On-disk pipeline document. Only operation kinds and parameter values are
/// persisted; images are always recomputed on load.
#[derive(Serialize, Deserialize)]
struct PipelineFile {
    operations: Vec<OpEntry>,
}

#[derive(Serialize, Deserialize)]
struct OpEntry {
    class: String,
    params: Parameters,
}

/// Serialize the stack's layers in application order.
pub fn save_pipeline(stack: &OperationStack, path: &Path) -> Result<()> {
    let doc = PipelineFile {
        operations: stack
            .layers()
            .map(|layer| OpEntry {
                class: layer.kind().name().to_string(),
                params: layer.params().clone(),
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&doc)?;
    fs::write(path, json).map_err(|e| Error::io(path, e))?;
    log_info!("saved pipeline ({} operations) to {}", doc.operations.len(), path.display());
    Ok(())
}

/// Rebuild a stack by replaying the persisted document into an empty
/// pipeline. Every kind name is validated against the registry before any
/// layer is created, so an unknown kind never leaves a half-built stack.
/// Parameters missing from an entry silently keep their defaults.
pub fn load_pipeline(
    path: &Path,
    ctx: OpContext,
    sprites: Arc<SpriteRepository>,
) -> Result<OperationStack> {
    let json = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let doc: PipelineFile = serde_json::from_str(&json)?;

    let kinds: Vec<OpKind> = doc
        .operations
        .iter()
        .map(|entry| OpKind::from_name(&entry.class))
        .collect::<Result<_>>()?;

    let mut stack = OperationStack::new(ctx, sprites);
    for (kind, entry) in kinds.into_iter().zip(doc.operations) {
        let layer = stack.push(kind);
        for (key, value) in entry.params.iter() {
            layer.params_mut().set(key, value);
        }
    }
    log_info!("loaded pipeline ({} operations) from {}", stack.len(), path.display());
    Ok(stack)
}

/// Write the composited `right` buffer as a PNG.
pub fn export_png(pair: &ImagePair, path: &Path) -> Result<()> {
    pair.right.save(path)?;
    log_info!("exported {}x{} PNG to {}", pair.resolution(), pair.resolution(), path.display());
    Ok(())
}

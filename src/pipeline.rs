// ============================================================================
// PIPELINE — ordered operation layers with a selection cursor
// ============================================================================

use std::sync::Arc;

use crate::canvas::ImagePair;
use crate::error::{Error, Result};
use crate::ops::{Memoized, OpContext, OpKind, instantiate};
use crate::params::Parameters;
use crate::sprites::SpriteRepository;

/// One pipeline entry: a memoized operation instance plus its current
/// parameter values.
pub struct Layer {
    kind: OpKind,
    memo: Memoized,
    params: Parameters,
}

impl Layer {
    fn new(kind: OpKind, ctx: OpContext, sprites: &Arc<SpriteRepository>) -> Self {
        let memo = Memoized::new(instantiate(kind, ctx, sprites));
        let params = memo.op().defaults();
        Self { kind, memo, params }
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Parameters {
        &mut self.params
    }

    pub fn describe(&self) -> String {
        self.memo.op().describe(&self.params)
    }

    /// How many times this layer's kernel has actually executed.
    pub fn runs(&self) -> u64 {
        self.memo.runs()
    }
}

/// The operation pipeline: layers in application order and a cursor marking
/// the layer currently being edited.
///
/// [`apply`](Self::apply) always replays from a blank canvas through every
/// layer up to and including the cursor; per-layer memoization keeps a
/// replay cheap when nothing upstream changed.
pub struct OperationStack {
    ctx: OpContext,
    sprites: Arc<SpriteRepository>,
    layers: Vec<Layer>,
    cursor: Option<usize>,
}

impl OperationStack {
    pub fn new(ctx: OpContext, sprites: Arc<SpriteRepository>) -> Self {
        Self {
            ctx,
            sprites,
            layers: Vec::new(),
            cursor: None,
        }
    }

    pub fn resolution(&self) -> u32 {
        self.ctx.resolution
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    /// Insert a new layer of `kind` directly after the cursor (or at the
    /// front of an empty stack) and move the cursor onto it.
    pub fn push(&mut self, kind: OpKind) -> &mut Layer {
        let at = match self.cursor {
            Some(i) => i + 1,
            None => 0,
        };
        self.layers
            .insert(at, Layer::new(kind, self.ctx, &self.sprites));
        self.cursor = Some(at);
        &mut self.layers[at]
    }

    pub fn current(&self) -> Result<&Layer> {
        let i = self.cursor.ok_or(Error::EmptyPipeline)?;
        Ok(&self.layers[i])
    }

    pub fn current_mut(&mut self) -> Result<&mut Layer> {
        let i = self.cursor.ok_or(Error::EmptyPipeline)?;
        Ok(&mut self.layers[i])
    }

    /// Move the cursor to layer `index`.
    pub fn select(&mut self, index: usize) -> Result<()> {
        if index >= self.layers.len() {
            return Err(Error::NotInStack(index));
        }
        self.cursor = Some(index);
        Ok(())
    }

    /// Remove the layer under the cursor. The cursor moves to the previous
    /// layer, or to nothing when the removed layer was first.
    pub fn remove_current(&mut self) -> Result<OpKind> {
        let i = self.cursor.ok_or(Error::EmptyPipeline)?;
        let removed = self.layers.remove(i);
        self.cursor = i.checked_sub(1);
        Ok(removed.kind())
    }

    /// Replay from a blank canvas through every layer up to and including
    /// the cursor, and return the resulting pair.
    pub fn apply(&mut self) -> Result<ImagePair> {
        let upto = self.cursor.ok_or(Error::EmptyPipeline)?;
        let mut pair = ImagePair::new(self.ctx.resolution);
        for layer in &mut self.layers[..=upto] {
            pair = layer.memo.execute(&pair, &layer.params);
        }
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(res: u32) -> OperationStack {
        let ctx = OpContext {
            resolution: res,
            seed: 42,
        };
        OperationStack::new(ctx, Arc::new(SpriteRepository::new()))
    }

    #[test]
    fn empty_stack_refuses_to_apply() {
        let mut s = stack(8);
        assert!(matches!(s.apply(), Err(Error::EmptyPipeline)));
        assert!(matches!(s.current(), Err(Error::EmptyPipeline)));
    }

    #[test]
    fn push_inserts_after_cursor() {
        let mut s = stack(8);
        s.push(OpKind::Perlin);
        s.push(OpKind::Copy);
        s.select(0).unwrap();
        s.push(OpKind::Blur);
        let kinds: Vec<OpKind> = s.layers().map(|l| l.kind()).collect();
        assert_eq!(kinds, vec![OpKind::Perlin, OpKind::Blur, OpKind::Copy]);
        assert_eq!(s.cursor(), Some(1));
    }

    #[test]
    fn select_out_of_range_is_an_error() {
        let mut s = stack(8);
        s.push(OpKind::Perlin);
        assert!(matches!(s.select(3), Err(Error::NotInStack(3))));
        assert!(s.select(0).is_ok());
    }

    #[test]
    fn remove_moves_cursor_to_previous_layer() {
        let mut s = stack(8);
        s.push(OpKind::Perlin);
        s.push(OpKind::Copy);
        assert_eq!(s.remove_current().unwrap(), OpKind::Copy);
        assert_eq!(s.cursor(), Some(0));
        assert_eq!(s.remove_current().unwrap(), OpKind::Perlin);
        assert_eq!(s.cursor(), None);
        assert!(s.is_empty());
    }

    #[test]
    fn apply_stops_at_the_cursor() {
        let mut s = stack(8);
        s.push(OpKind::Perlin);
        s.push(OpKind::Copy);
        s.push(OpKind::Level);

        s.select(0).unwrap();
        let at_noise = s.apply().unwrap();
        // Copy has not run for this prefix, so `right` is still blank.
        assert!(at_noise.right.pixels().all(|p| p.0 == [0, 0, 0, 0]));

        s.select(1).unwrap();
        let at_copy = s.apply().unwrap();
        assert_eq!(at_copy.right.as_raw(), at_copy.left.as_raw());
    }

    #[test]
    fn replay_reuses_cached_layers() {
        let mut s = stack(8);
        s.push(OpKind::Perlin);
        s.push(OpKind::Blur);
        let first = s.apply().unwrap();
        let second = s.apply().unwrap();
        assert_eq!(first, second);
        for layer in s.layers() {
            assert_eq!(layer.runs(), 1);
        }
    }

    #[test]
    fn editing_a_layer_recomputes_only_downstream() {
        let mut s = stack(8);
        s.push(OpKind::Perlin);
        s.push(OpKind::Copy);
        s.push(OpKind::Blur);
        s.apply().unwrap();

        // Change the blur radius: the two upstream layers stay cached.
        s.current_mut().unwrap().params_mut().set("Radius", 2.0);
        s.apply().unwrap();
        let runs: Vec<u64> = s.layers().map(|l| l.runs()).collect();
        assert_eq!(runs, vec![1, 1, 2]);
    }

    #[test]
    fn editing_an_upstream_layer_invalidates_downstream() {
        let mut s = stack(8);
        s.push(OpKind::Perlin);
        s.push(OpKind::Copy);
        s.apply().unwrap();

        s.select(0).unwrap();
        s.current_mut().unwrap().params_mut().set("Seed", 7.0);
        s.select(1).unwrap();
        s.apply().unwrap();
        let runs: Vec<u64> = s.layers().map(|l| l.runs()).collect();
        assert_eq!(runs, vec![2, 2]);
    }

    #[test]
    fn new_layer_starts_with_its_defaults() {
        let mut s = stack(8);
        let layer = s.push(OpKind::Mix);
        assert_eq!(layer.params().get("Ratio", 0.0), 0.5);
    }
}

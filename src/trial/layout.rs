//! Randomized complete block layouts.
//!
//! Each block holds every treatment once per replicate, in an
//! independently shuffled order.

use crate::error::TrialError;
use crate::models::{Plot, TrialConfig};
use rand::seq::SliceRandom;
use rand::Rng;

/// Plot id for a treatment in a block and replicate, all zero-based except
/// the block: `B{block}-T{treatment+1}-R{rep+1}`.
pub fn plot_id(block: u32, treatment: usize, rep: u32) -> String {
    format!("B{}-T{}-R{}", block, treatment + 1, rep + 1)
}

/// Generate an RCBD layout: one row per block.
pub fn generate_layout<R: Rng + ?Sized>(config: &TrialConfig, rng: &mut R) -> Vec<Vec<Plot>> {
    (1..=config.num_blocks)
        .map(|block| {
            let mut row = Vec::with_capacity(config.num_treatments * config.num_reps as usize);
            for rep in 0..config.num_reps {
                let mut treatments: Vec<usize> = (0..config.num_treatments).collect();
                treatments.shuffle(rng);
                row.extend(
                    treatments
                        .into_iter()
                        .map(|t| Plot::real(plot_id(block, t, rep), block, t)),
                );
            }
            row
        })
        .collect()
}

/// Insert a blank plot at `position` in `block` (clamped to the row end).
///
/// Returns the new blank's id.
pub fn insert_blank(
    layout: &mut [Vec<Plot>],
    block: u32,
    position: usize,
) -> Result<String, TrialError> {
    let row = block_row_mut(layout, block)?;
    let next = row.iter().filter(|p| p.is_blank()).count() + 1;
    let mut id = format!("blank-b{}-{}", block, next);
    let mut suffix = next;
    while row.iter().any(|p| p.id() == id) {
        suffix += 1;
        id = format!("blank-b{}-{}", block, suffix);
    }
    let position = position.min(row.len());
    row.insert(position, Plot::blank(id.clone(), block));
    Ok(id)
}

/// Remove a blank plot by id. Real plots cannot be removed.
pub fn remove_blank(layout: &mut [Vec<Plot>], plot_id: &str) -> Result<(), TrialError> {
    for row in layout.iter_mut() {
        if let Some(pos) = row.iter().position(|p| p.id() == plot_id) {
            if !row[pos].is_blank() {
                return Err(TrialError::InvalidLayout(format!(
                    "plot '{}' is not blank",
                    plot_id
                )));
            }
            row.remove(pos);
            return Ok(());
        }
    }
    Err(TrialError::UnknownPlot(plot_id.to_string()))
}

/// Reshuffle the real plots of one block. Blanks keep their positions.
pub fn randomize_block<R: Rng + ?Sized>(
    layout: &mut [Vec<Plot>],
    block: u32,
    rng: &mut R,
) -> Result<(), TrialError> {
    let row = block_row_mut(layout, block)?;
    let slots: Vec<usize> = row
        .iter()
        .enumerate()
        .filter(|(_, p)| !p.is_blank())
        .map(|(i, _)| i)
        .collect();
    let mut real: Vec<Plot> = slots.iter().map(|&i| row[i].clone()).collect();
    real.shuffle(rng);
    for (slot, plot) in slots.into_iter().zip(real) {
        row[slot] = plot;
    }
    Ok(())
}

fn block_row_mut(layout: &mut [Vec<Plot>], block: u32) -> Result<&mut Vec<Plot>, TrialError> {
    layout
        .iter_mut()
        .find(|row| row.first().map(Plot::block) == Some(block))
        .ok_or(TrialError::UnknownBlock(block))
}

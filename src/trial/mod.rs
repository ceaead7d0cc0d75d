//! Trial documents: storage, layout generation and data entry.

pub mod entry;
pub mod layout;
pub mod store;

pub use entry::{
    add_assessment_date, add_plot_cells, drop_plot_cells, record_value, set_note, simulate_date,
};
pub use layout::{generate_layout, insert_blank, randomize_block, remove_blank};
pub use store::{import_trial, list_trials, load_trial, save_trial, TrialEntry};

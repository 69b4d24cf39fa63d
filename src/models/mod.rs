//! Core data structures shared across the pipeline.

mod paper;

pub use paper::{
    Paper, PaperBuilder, NO_ABSTRACT, NO_JOURNAL, NO_PUBLICATION_DATE, NO_TITLE,
};

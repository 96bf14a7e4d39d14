// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Library functions to build trackers as defined by the user.

use std::io::BufWriter;
use std::rc::Rc;
use std::{fs, io};

use crate::tracker::{DevNullTracker, EntityManager, TextTracker, TrackConfigError};
use crate::{Tracker, Writer};

/// Configuration options for the text tracker.
pub struct TrackerConfig<'a> {
    /// Enable this tracker.
    pub enable: bool,

    /// Set the level at which this tracker should be enabled.
    pub level: log::Level,

    /// A regular expression to match which entities should have this level
    /// applied.
    pub filter_regex: &'a str,

    /// If required, the name of the file to which the tracker will write.
    /// The tracker writes to `stdout` otherwise.
    pub file: Option<&'a str>,
}

impl Default for TrackerConfig<'_> {
    fn default() -> Self {
        Self {
            enable: true,
            level: log::Level::Warn,
            filter_regex: "",
            file: None,
        }
    }
}

/// Build the [`EntityManager`] for a tracker.
///
/// The user can pass a filter regular expression which will set the level only
/// for matching Entities and set all other Entities to only emit errors.
fn build_entity_manager(config: &TrackerConfig) -> Result<EntityManager, TrackConfigError> {
    let default_level = if config.filter_regex.is_empty() {
        config.level
    } else {
        log::Level::Error
    };

    let mut entity_manager = EntityManager::new(default_level);
    if !config.filter_regex.is_empty() {
        entity_manager.add_entity_level_filter(config.filter_regex, config.level)?;
    }
    Ok(entity_manager)
}

/// Set up the tracker according the the command-line arguments
pub fn setup_trackers(config: &TrackerConfig) -> Result<Tracker, TrackConfigError> {
    if !config.enable {
        return Ok(Rc::new(DevNullTracker));
    }

    let entity_manager = build_entity_manager(config)?;
    let writer: Writer = match config.file {
        Some(file) => {
            let f = fs::File::create(file)
                .map_err(|e| TrackConfigError(format!("Failed to create {file}: {e}")))?;
            Box::new(BufWriter::new(f))
        }
        None => Box::new(BufWriter::new(io::stdout())),
    };
    Ok(Rc::new(TextTracker::new(entity_manager, writer)))
}

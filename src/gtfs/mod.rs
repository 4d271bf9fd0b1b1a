//! GTFS static-schedule input: the three tables the pipeline joins, and
//! the sources they can be read from.

pub mod archive;
pub mod model;
pub mod source;
pub mod tables;
pub mod time;

pub use model::{Stop, StopTime, Trip};
pub use source::{InputKey, InputSource};
pub use tables::GtfsTables;

pub const STOPS_FILE: &str = "stops.txt";
pub const TRIPS_FILE: &str = "trips.txt";
pub const STOP_TIMES_FILE: &str = "stop_times.txt";

/// Files every load must find, in the order they are checked.
pub const REQUIRED_FILES: &[&str] = &[STOPS_FILE, STOP_TIMES_FILE, TRIPS_FILE];

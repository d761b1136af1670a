pub mod tracker_model;

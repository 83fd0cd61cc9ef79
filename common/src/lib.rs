pub mod catalog;
pub mod runtime;
pub mod socket;
pub mod systemd;

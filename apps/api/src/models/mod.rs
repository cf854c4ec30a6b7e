pub mod banding;
pub mod feedback;
pub mod record;

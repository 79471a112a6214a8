//! Training utilities for self-supervised depth and segmentation models.
//!
//! * [`schedule`] - warmup + step/cosine learning rate schedules
//! * [`meter`] - running averages of named metrics
//! * [`nested`] - nested output trees and scalar logging
//! * [`augment`] - random image masking

pub mod augment;
pub mod error;
pub mod meter;
pub mod nested;
pub mod schedule;

pub use augment::random_image_mask;
pub use error::{Result, TrainError};
pub use meter::AverageMeter;
pub use nested::{flatten_scalars, log_scalars, scalar_to_float, tensor_to_float, Nested, ScalarValue};
pub use schedule::{consistency_weight, lr_multiplier, ScheduleConfig, ScheduleKind};

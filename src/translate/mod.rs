//! Pure translators from Camel endpoint URIs to scheduling and scaling settings

pub mod cron;
pub mod keda;
pub mod uri;

pub use cron::{cron_equivalent, global_schedule, schedule_for_uris, CronInfo};
pub use keda::{combine_triggers, discover_triggers, map_trigger, KedaTrigger};
pub use uri::{EndpointUri, UriError};

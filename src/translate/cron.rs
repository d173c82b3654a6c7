//! Translation of periodic endpoints into a single cron schedule
//!
//! Three consumers are understood:
//! - `timer`: only when the period can be written as a cron cadence, i.e. a
//!   divisor of 24 hours or a divisor of 60 minutes (`timer:tick?period=1m`)
//! - `cron` and `quartz`: when the expression carries no seconds (or seconds
//!   set to `0`) and no specific year (`cron:tab?schedule=0/2+*+*+*+?`)
//!
//! Several endpoints agree on a schedule only when every one of them translates
//! to an equivalent expression. Passive consumers (e.g. `direct`) are neutral.
//! Anything else voids the result: no schedule is better than a wrong one.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::uri::{component, EndpointUri};

static TIMER_PERIOD_MILLIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("valid regex"));

static TIMER_PERIOD_HUMAN_READABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([0-9]+)h)?(?:([0-9]+)m)?(?:([0-9]+)s)?$").expect("valid regex")
});

/// Components whose endpoints can be turned into a schedule
pub const SCHEDULED_COMPONENTS: [&str; 3] = ["timer", "quartz", "cron"];

/// Schedule agreed by a set of endpoints, with the components that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronInfo {
    pub components: Vec<String>,
    pub schedule: String,
}

impl CronInfo {
    fn new(component: &str, schedule: impl Into<String>) -> Self {
        Self {
            components: vec![component.to_string()],
            schedule: schedule.into(),
        }
    }

    fn with_components(mut self, components: &[String]) -> Self {
        for c in components {
            if !self.components.contains(c) {
                self.components.push(c.clone());
            }
        }
        self
    }
}

/// Consensus schedule for all the "from" endpoints of an integration.
///
/// Endpoints whose scheme is in `passive` are ignored; any other endpoint that
/// is not one of [`SCHEDULED_COMPONENTS`] voids the consensus.
pub fn global_schedule<S: AsRef<str>>(uris: &[S], passive: &BTreeSet<String>) -> Option<CronInfo> {
    let mut scheduled = Vec::new();
    for uri in uris {
        let uri = uri.as_ref();
        let comp = component(uri);
        if SCHEDULED_COMPONENTS.contains(&comp) {
            scheduled.push(uri);
        } else if !passive.contains(comp) {
            return None;
        }
    }
    schedule_for_uris(&scheduled)
}

/// Consensus schedule among endpoints that must all be translatable
pub fn schedule_for_uris<S: AsRef<str>>(uris: &[S]) -> Option<CronInfo> {
    let mut global: Option<CronInfo> = None;
    for uri in uris {
        let info = schedule_for_uri(uri.as_ref())?;
        global = match global {
            None => Some(info),
            Some(current) => {
                if !cron_equivalent(&current.schedule, &info.schedule) {
                    return None;
                }
                Some(current.with_components(&info.components))
            }
        };
    }
    global
}

/// Schedule for a single endpoint, if its component supports one
pub fn schedule_for_uri(uri: &str) -> Option<CronInfo> {
    let parsed = EndpointUri::parse(uri).ok()?;
    match parsed.scheme.as_str() {
        "timer" => timer_to_cron_info(&parsed),
        "quartz" => quartz_to_cron_info(&parsed),
        "cron" => cron_to_cron_info(&parsed),
        _ => None,
    }
}

fn timer_to_cron_info(uri: &EndpointUri) -> Option<CronInfo> {
    if uri.param("delay").is_some()
        || uri.param("repeatCount").is_some()
        || uri.param("time").is_some()
    {
        return None;
    }

    let period = timer_period_millis(uri.param("period").unwrap_or(""))?;
    if period == 0 || period % 1000 != 0 {
        return None;
    }
    let seconds = period / 1000;

    if seconds % 3600 == 0 {
        let hours = seconds / 3600;
        if hours == 24 {
            return Some(CronInfo::new("timer", "0 0 * * ?"));
        } else if hours < 24 && 24 % hours == 0 {
            return Some(CronInfo::new("timer", format!("0 0/{} * * ?", hours)));
        }
    } else if seconds % 60 == 0 {
        let minutes = seconds / 60;
        if minutes < 60 && 60 % minutes == 0 {
            return Some(CronInfo::new("timer", format!("0/{} * * * ?", minutes)));
        }
    }
    None
}

/// Period in milliseconds, from either `60000` or `1h2m3s` notation
fn timer_period_millis(period: &str) -> Option<u64> {
    if TIMER_PERIOD_MILLIS.is_match(period) {
        return period.parse().ok();
    }

    let caps = TIMER_PERIOD_HUMAN_READABLE.captures(period)?;
    let mut millis: u64 = 0;
    for (group, factor) in [(1, 3_600_000u64), (2, 60_000), (3, 1_000)] {
        if let Some(m) = caps.get(group) {
            let value: u64 = m.as_str().parse().ok()?;
            millis = millis.checked_add(value.checked_mul(factor)?)?;
        }
    }
    Some(millis)
}

fn quartz_to_cron_info(uri: &EndpointUri) -> Option<CronInfo> {
    if uri.param("fireNow").is_some()
        || uri.param("customCalendar").is_some()
        || uri.param("startDelayedSeconds").is_some()
    {
        return None;
    }
    let normalized = to_kubernetes_cron_schedule(uri.param("cron")?)?;
    Some(CronInfo::new("quartz", normalized))
}

fn cron_to_cron_info(uri: &EndpointUri) -> Option<CronInfo> {
    let normalized = to_kubernetes_cron_schedule(uri.param("schedule")?)?;
    Some(CronInfo::new("cron", normalized))
}

/// Two schedules are equivalent when they only differ by `?` versus `*`
pub fn cron_equivalent(a: &str, b: &str) -> bool {
    a.replace('?', "*") == b.replace('?', "*")
}

/// Reduce a 5 to 7 field expression to the 5 fields a CronJob accepts.
///
/// A leading seconds field is dropped only when it is `0`, a trailing year
/// field only when it matches every year.
pub fn to_kubernetes_cron_schedule(cron: &str) -> Option<String> {
    let mut parts: Vec<&str> = cron.split(' ').collect();

    if parts.len() > 5 {
        if parts[0] == "0" {
            parts.remove(0);
        } else {
            return None;
        }
    }

    if parts.len() == 6 && (parts[5] == "*" || parts[5] == "?") {
        parts.truncate(5);
    }

    if parts.len() == 5 {
        Some(parts.join(" "))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passive() -> BTreeSet<String> {
        ["direct", "log"].iter().map(|s| s.to_string()).collect()
    }

    fn schedule(uris: &[&str]) -> Option<String> {
        schedule_for_uris(uris).map(|c| c.schedule)
    }

    #[test]
    fn test_timer_one_minute() {
        assert_eq!(schedule(&["timer:tick?period=60000"]).as_deref(), Some("0/1 * * * ?"));
        assert_eq!(schedule(&["timer:tick?period=1m"]).as_deref(), Some("0/1 * * * ?"));
    }

    #[test]
    fn test_timer_one_day() {
        assert_eq!(schedule(&["timer:tick?period=86400000"]).as_deref(), Some("0 0 * * ?"));
        assert_eq!(schedule(&["timer:tick?period=24h"]).as_deref(), Some("0 0 * * ?"));
    }

    #[test]
    fn test_timer_hour_divisors() {
        assert_eq!(schedule(&["timer:tick?period=2h"]).as_deref(), Some("0 0/2 * * ?"));
        assert_eq!(schedule(&["timer:tick?period=3h"]).as_deref(), Some("0 0/3 * * ?"));
        assert_eq!(schedule(&["timer:tick?period=5h"]), None);
        assert_eq!(schedule(&["timer:tick?period=48h"]), None);
    }

    #[test]
    fn test_timer_rejected_periods() {
        assert_eq!(schedule(&["timer:tick?period=35m"]), None);
        assert_eq!(schedule(&["timer:tick?period=50s"]), None);
        assert_eq!(schedule(&["timer:tick?period=1500"]), None);
        assert_eq!(schedule(&["timer:tick?period=abc"]), None);
        assert_eq!(schedule(&["timer:tick"]), None);
    }

    #[test]
    fn test_timer_exclusive_parameters() {
        assert_eq!(schedule(&["timer:tick?period=1m&delay=10"]), None);
        assert_eq!(schedule(&["timer:tick?period=1m&repeatCount=1"]), None);
        assert_eq!(schedule(&["timer:tick?period=1m&time=2020-01-01"]), None);
    }

    #[test]
    fn test_timer_combined_notation() {
        assert_eq!(schedule(&["timer:tick?period=1h0m0s"]).as_deref(), Some("0 0/1 * * ?"));
        assert_eq!(schedule(&["timer:tick?period=1m30s"]), None);
    }

    #[test]
    fn test_cron_normalization() {
        assert_eq!(
            schedule(&["cron:tab?schedule=0/3+10+*+*+*"]).as_deref(),
            Some("0/3 10 * * *")
        );
        assert_eq!(
            schedule(&["cron:tab?schedule=0+0/2+*+*+*+?"]).as_deref(),
            Some("0/2 * * * ?")
        );
        assert_eq!(schedule(&["cron:tab?schedule=1+0/2+*+*+*+?"]), None);
        assert_eq!(
            schedule(&["cron:tab?schedule=0+0/2+*+*+*+?+*"]).as_deref(),
            Some("0/2 * * * ?")
        );
        assert_eq!(schedule(&["cron:tab?schedule=0+0/2+*+*+*+?+2020"]), None);
    }

    #[test]
    fn test_quartz() {
        assert_eq!(
            schedule(&["quartz:trigger?cron=0+0/2+*+*+*+?"]).as_deref(),
            Some("0/2 * * * ?")
        );
        assert_eq!(schedule(&["quartz:trigger?cron=0+0/2+*+*+*+?&fireNow=true"]), None);
    }

    #[test]
    fn test_consensus_between_cron_and_timer() {
        let info = schedule_for_uris(&[
            "cron:tab?schedule=0+0/2+*+*+?",
            "timer:tick?period=7200000",
        ])
        .unwrap();
        assert_eq!(info.schedule, "0 0/2 * * ?");
        assert_eq!(info.components, vec!["cron".to_string(), "timer".to_string()]);

        assert_eq!(
            schedule(&["cron:tab?schedule=0+0/2+*+*+?", "timer:tick?period=10800000"]),
            None
        );
    }

    #[test]
    fn test_consensus_symmetric_and_reflexive() {
        let a = "cron:tab?schedule=0/5+*+*+*+*";
        let b = "timer:tick?period=5m";
        let ab = schedule(&[a, b]).unwrap();
        let ba = schedule(&[b, a]).unwrap();
        assert!(cron_equivalent(&ab, &ba));
        assert_eq!(schedule(&[a, a]), schedule(&[a]));
    }

    #[test]
    fn test_untranslatable_voids_consensus() {
        assert_eq!(schedule(&["timer:tick?period=1m", "timer:tock?period=35m"]), None);
    }

    #[test]
    fn test_global_schedule_passive() {
        let uris = ["timer:tick?period=1m", "direct:start"];
        assert_eq!(
            global_schedule(&uris, &passive()).map(|c| c.schedule).as_deref(),
            Some("0/1 * * * ?")
        );

        let uris = ["timer:tick?period=1m", "kafka:topic"];
        assert_eq!(global_schedule(&uris, &passive()), None);

        let only_passive = ["direct:start"];
        assert_eq!(global_schedule(&only_passive, &passive()), None);
    }

    #[test]
    fn test_cron_equivalent() {
        assert!(cron_equivalent("0 0/2 * * ?", "0 0/2 * * *"));
        assert!(!cron_equivalent("0 0/2 * * ?", "0 0/3 * * ?"));
    }
}

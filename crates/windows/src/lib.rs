//! The window policy: a pure mapping from an experiment and an as-of date to
//! the set of analysis windows due for (re)computation.
//!
//! No side effects and no wall-clock reads. For a fixed experiment the due
//! set only ever grows as the as-of date advances, which is what makes
//! recomputation safe: a window once due stays due.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use core_types::{midnight_utc, AnalysisWindow, Experiment, TimeRange, WindowKind};

/// Returns every analysis window due for the experiment as of the given date.
///
/// Daily windows are due for each fully elapsed day since enrollment start,
/// weekly windows for each fully elapsed 7-day period, growth windows for
/// each fully elapsed 28-day period, all bounded by the experiment's end
/// date when one is set. The overall window is due as soon as any elapsed
/// time exists and is recomputed on every run; it is flagged final once the
/// as-of date has passed the experiment's end date.
///
/// An as-of date on or before enrollment start yields the empty set; that is
/// not an error, the experiment simply has no complete windows yet.
pub fn due_windows(experiment: &Experiment, as_of: NaiveDate) -> Vec<AnalysisWindow> {
    let mut windows = Vec::new();

    let data_end = match experiment.end_date {
        Some(end) => as_of.min(end),
        None => as_of,
    };
    let elapsed_days = (data_end - experiment.start_date).num_days().max(0) as u32;

    for kind in [WindowKind::Daily, WindowKind::Weekly, WindowKind::Growth] {
        // period_days is Some for every periodic kind.
        let period = kind.period_days().unwrap_or(1);
        for offset in 1..=(elapsed_days / period) {
            windows.push(AnalysisWindow { kind, offset, is_final: false });
        }
    }

    if as_of > experiment.start_date {
        let is_final = experiment.end_date.is_some_and(|end| as_of > end);
        windows.push(AnalysisWindow::overall(is_final));
    }

    windows
}

/// Resolves the event time range of one window for one unit, or `None` if
/// the unit is not eligible for the window.
///
/// For periodic windows a unit is eligible once its window has fully elapsed
/// by the as-of date; units enrolled too late for that are excluded from the
/// window entirely, which keeps per-window sample sizes meaningful. For the
/// overall window any unit with nonzero elapsed time is eligible and its
/// range runs from enrollment to the as-of date.
pub fn event_range_for_unit(
    window: &AnalysisWindow,
    enrolled_at: DateTime<Utc>,
    as_of: NaiveDate,
) -> Option<TimeRange> {
    let as_of_start = midnight_utc(as_of);

    match window.kind {
        WindowKind::Overall => {
            (enrolled_at < as_of_start).then(|| TimeRange::new(enrolled_at, as_of_start))
        }
        _ => {
            let start = enrolled_at + Duration::days(i64::from(window.start_day()?));
            let end = enrolled_at + Duration::days(i64::from(window.end_day()?));
            (end <= as_of_start).then(|| TimeRange::new(start, end))
        }
    }
}

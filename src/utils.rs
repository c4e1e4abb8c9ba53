use std::time::Duration;

const IDLE_PLAYBACK_TIME: &str = "--:-- / --:--";

fn format_minutes(time: Duration) -> String {
    let seconds = time.as_secs();

    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Renders the playback position the way the control panel displays it, e.g. `1:05 / 3:00`.
pub(crate) fn format_playback_time(progress: Option<(Duration, Duration)>) -> String {
    match progress {
        Some((position, duration)) => {
            format!("{} / {}", format_minutes(position), format_minutes(duration))
        }
        None => IDLE_PLAYBACK_TIME.to_string(),
    }
}

pub(crate) fn completion_fraction(progress: Option<(Duration, Duration)>) -> f32 {
    match progress {
        Some((position, duration)) if !duration.is_zero() => {
            (position.as_secs_f32() / duration.as_secs_f32()).clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

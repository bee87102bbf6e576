//! Audio and speech feedback.
//!
//! Each function builds a shell command pairing a short SoX tone with a
//! speech-dispatcher announcement; the caller hands it to a
//! [`Spawner`](crate::spawn::Spawner) and never waits for it.

fn pitch(tag: u32) -> u32 {
    400 + tag * 50
}

/// Window-provided text ends up inside a double quoted shell word, so only
/// harmless characters are kept.
fn speakable(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | ','))
        .collect()
}

pub fn startup() -> String {
    "play -nq synth 0.15 sine 500 sine 800 sine 1200 vol 0.4 & \
     spd-say -r -30 \"DINA window manager started\""
        .to_string()
}

/// Switched to the 1-based `tag`.
pub fn tag(tag: u32) -> String {
    format!(
        "play -nq synth 0.1 sine {} vol 0.3 & spd-say -r -50 \"Tag {}\"",
        pitch(tag),
        tag
    )
}

pub fn window_move(from: u32, to: u32) -> String {
    format!(
        "play -nq synth 0.1 sine {} sine {} vol 0.3 & \
         spd-say -r -40 \"Window moved from tag {} to tag {}\"",
        pitch(from),
        pitch(to),
        from,
        to
    )
}

pub fn window_untracked(app: &str) -> String {
    format!(
        "play -nq synth 0.1 sine 600 sine 400 vol 0.3 & spd-say -r -40 \"{} no longer tracked\"",
        speakable(app)
    )
}

/// Announce a placement taken from the workspace memory. Tag 1 is where
/// windows go anyway and stays silent.
pub fn tag_placement(app: &str, tag: u32) -> Option<String> {
    if tag <= 1 {
        return None;
    }
    Some(format!(
        "play -nq synth 0.1 sine {} sine {} vol 0.3 & \
         spd-say -r -40 \"{} automatically placed on tag {}\"",
        pitch(tag),
        500 + tag * 50,
        speakable(app),
        tag
    ))
}

pub fn mode(name: &str) -> String {
    format!(
        "play -nq synth 0.1 sine 800 vol 0.3 & spd-say -r -40 \"Mode {}\"",
        speakable(name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_pitch_rises_with_the_tag() {
        assert_eq!(tag(3), "play -nq synth 0.1 sine 550 vol 0.3 & spd-say -r -50 \"Tag 3\"");
        assert!(window_move(1, 2).contains("sine 450 sine 500"));
    }

    #[test]
    fn first_tag_placement_is_silent() {
        assert_eq!(tag_placement("firefox", 1), None);
        assert!(tag_placement("firefox", 4)
            .unwrap()
            .ends_with("\"firefox automatically placed on tag 4\""));
    }

    #[test]
    fn window_text_cannot_escape_the_quotes() {
        let cmd = window_untracked("evil\"; rm -rf ~ `x` $(y)");
        assert!(cmd.ends_with("\"evil rm -rf  x y no longer tracked\""));
    }
}

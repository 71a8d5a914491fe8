//! Canned prompts offered by the editing controls.

/// Starting points shown next to the prompt box.
pub const EXAMPLE_PROMPTS: &[&str] = &[
    "Add a majestic castle in the background",
    "Change my shirt to be bright red",
    "Put a cute cat on my shoulder",
    "Make the photo look like a watercolor painting",
];

/// Pool for the "surprise me" control.
pub const SURPRISE_PROMPTS: &[&str] = &[
    "Turn the scene into a neon-lit cyberpunk city",
    "Add a gentle layer of morning fog",
    "Make it look like an oil painting by Van Gogh",
    "Place a whimsical fairy sitting on a flower",
    "Transform the background into a lush, enchanted forest",
    "Add a dramatic, fiery sunset to the sky",
    "Give the subject elegant, steampunk-style goggles",
    "Surround the scene with floating, glowing lanterns",
    "Change the season to a snowy winter day",
    "Add a reflection in a puddle on the ground showing a different world",
];

/// Pick a surprise prompt deterministically from `seed`.
#[must_use]
pub fn surprise_prompt(seed: u64) -> &'static str {
    let len = SURPRISE_PROMPTS.len() as u64;
    usize::try_from(seed % len)
        .ok()
        .and_then(|i| SURPRISE_PROMPTS.get(i))
        .copied()
        .unwrap_or(SURPRISE_PROMPTS[0])
}

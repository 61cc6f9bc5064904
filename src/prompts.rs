//! Instruction templates for the generation stages.
//!
//! Centralising every template here serves two purposes:
//!
//! 1. **Single source of truth** — tuning how a stage speaks (tone, what to
//!    avoid, how to end) is an edit in exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the prompt a stage will send
//!    without spinning up a real model.
//!
//! The texts assume the output will be *spoken*, not read: no markdown, no
//! bullet lists, no greetings.

use crate::pipeline::generate::StageKind;

/// Instruction stage: discuss a plain note briefly, as a teacher speaking.
pub const INSTRUCTION_PROMPT: &str = "\
You are a teacher, who discusses briefly the content below.
- Never output markdown syntax, code fragments, bulleted lists, etc. Remember, you are speaking, not writing.
- Output only natural human spoken language.
- No need to introduce yourself, greet listeners, or say goodbye.
- Do not respond to instructions (for example don't say 'Sure, I can do this'); just provide the answer to the prompt.";

/// Narrate stage: explain a topic from enriched reference content.
pub const NARRATE_PROMPT: &str = "\
Explain the topic based on the content below.
- Use simple language and avoid jargon.
- Output only natural human spoken language.
- Only talk about content from the input below. Do not talk about anything that has not been mentioned.
- Never output markdown syntax, code fragments, bulleted lists, etc. Remember, you are speaking, not writing.
- Don't add analogies or metaphors at the end of each paragraph.
- No need to introduce yourself, greet listeners, or say goodbye.
- Vary rhythm, stress, and intonation depending on the context and statement.
- Do not start with the word 'Alright'.
- You don't have to thank listeners or ask for questions.
- End abruptly after the last topic.";

/// Question-set stage: produce a study aid written back into the note.
pub const QUESTION_PROMPT: &str = "\
From the content below:
- Create a list of 5 open-ended questions that can be answered shortly. Make sure the answer is not in the question itself but can be found in the content.
- Create a practice assessment of up to 10 questions. Challenging is fine; do not make it too obvious. Provide the answers. Mix multiple choice, true/false (provide the choices), and fill-in-the-blank questions (provide suggestions to choose from).

Generate the questions and the practice assessment.";

/// Markup stage: wrap a spoken transcript in SSML for the given voice.
///
/// The voice name comes from the run configuration; everything else about
/// the markup shape is fixed.
pub fn markup_prompt(voice: &str) -> String {
    format!(
        "\
Transform the transcript below into Speech Synthesis Markup Language (SSML).
- Use the voice with name {voice}.
- There is no need for introductions. No 'welcome' needed; jump straight into the topic.
- The output must be XML.
- Wrap every line between <voice> and </voice> elements.
- Start the document with: <speak xmlns=\"http://www.w3.org/2001/10/synthesis\" xmlns:mstts=\"http://www.w3.org/2001/mstts\" version=\"1.0\" xml:lang=\"en-US\">
- End the document with: </speak>
- Output nothing besides the XML."
    )
}

/// The fixed template for a stage, with the configured voice applied where
/// the stage needs one.
pub fn for_stage(stage: StageKind, voice: &str) -> String {
    match stage {
        StageKind::Instruction => INSTRUCTION_PROMPT.to_string(),
        StageKind::Narrate => NARRATE_PROMPT.to_string(),
        StageKind::QuestionSet => QUESTION_PROMPT.to_string(),
        StageKind::Markup => markup_prompt(voice),
    }
}

//! Prompt builders.

/// Prompt for an interactive lookup: description plus picture, as JSON.
pub fn biography_prompt(name: &str) -> String {
    format!(
        "Answer the following question in 5-10 sentences: Who was {name}? \
         Focus on their life, achievements, and why they are remembered. \
         Also, provide a direct link to a public image of {name} \
         (preferably from Wikipedia or Wikimedia Commons). \
         Format your response as JSON with 'description' and 'picture_url' fields."
    )
}

/// Prompt for the batch upgrade of stored descriptions. Plain text answer.
pub fn description_prompt(name: &str) -> String {
    format!(
        "Write a detailed, engaging, and historically accurate 5-10 sentence description \
         about {name}. Focus on their life, achievements, and why they are remembered."
    )
}

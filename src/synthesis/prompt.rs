use super::schema::result_schema_value;
use crate::model::GenerationRequest;

/// Builds the passage prompt. The prompt is a pure function of the request.
pub(crate) fn generation_prompt(request: &GenerationRequest) -> String {
    let tag = request.proficiency_tag.as_str();
    let budget = request.sentence_budget;
    let words = serde_json::to_string(&request.batch).unwrap_or_else(|_| "[]".to_string());

    let mut prompt = String::new();
    prompt.push_str(
        "You are writing a short reading passage for language learners. \
         Build it around the vocabulary below at the stated proficiency level.\n\n",
    );
    prompt.push_str(&format!("<sentence_length>\n{budget}\n</sentence_length>\n"));
    prompt.push_str(&format!("<proficiency>\n{tag}\n</proficiency>\n"));
    prompt.push_str(&format!("<vocabulary>\n{words}\n</vocabulary>\n\n"));

    prompt.push_str("Rules:\n");
    prompt.push_str("1. Use every word from <vocabulary> as the main focus of the passage.\n");
    if request.batch.is_empty() {
        prompt.push_str(&format!(
            "   The list is empty: choose common vocabulary appropriate for level {tag}.\n"
        ));
    } else {
        prompt.push_str(&format!(
            "   Other common words suitable for level {tag} may support them but must not dominate.\n"
        ));
    }
    prompt.push_str(&format!(
        "2. Keep grammar, kanji and vocabulary within level {tag}.\n"
    ));
    prompt.push_str(&format!(
        "3. Aim for about {budget} sentences forming one coherent, simple story.\n"
    ));
    prompt.push_str(
        "4. In the explanation, only discuss words from <vocabulary> and the grammar used.\n\n",
    );

    push_output_contract(&mut prompt);
    prompt
}

/// Builds the reformat-only prompt for a response that failed to parse.
pub(crate) fn repair_prompt(malformed: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "Reformat the passage below into a single JSON object. \
         Keep the content exactly the same; change only the formatting.\n\n",
    );
    prompt.push_str(&format!("<passage>\n{malformed}\n</passage>\n\n"));
    push_output_contract(&mut prompt);
    prompt
}

fn push_output_contract(prompt: &mut String) {
    let schema = result_schema_value();
    prompt.push_str(
        "Respond with one flat JSON object and nothing else. It must have exactly three \
         string fields: \"target\" (the passage), \"translation\" (its English translation) \
         and \"explanation\" (the grammar and key vocabulary used). Do not add prose, code \
         fences, escaped line breaks or extra fields.\n",
    );
    prompt.push_str(&format!("JSON schema:\n{schema}"));
}

//! Prompt templates
//!
//! Wording is free to change; the structure (which pieces go into which call)
//! is what the evaluator depends on.

pub const CORE_PERSONA: &str = "You are Scout, an experienced reviewer of major government \
projects. You assess project documentation against assurance criteria and you are precise \
about what the evidence does and does not show.";

pub const SYSTEM_EVIDENCE_POINTS: &str = "You answer a single evidence question using only the \
document extracts provided. If the extracts do not contain the answer, say so plainly. Answer \
in no more than three sentences.";

pub const SYSTEM_QUESTION: &str = "You are reviewing a project against an assurance criterion. \
Using the document extracts and the answers to the evidence questions, decide whether the \
project meets the criterion. Give a short justification, then finish with exactly one rating \
in square brackets: [Positive], [Neutral] or [Negative].";

/// Running hypothesis carried between criteria
pub fn hypothesis_section(hypothesis: &str) -> String {
    format!(
        "Your current hypotheses about this project, built from earlier criteria, are:\n{}",
        hypothesis
    )
}

pub fn evidence_point_question(criterion_question: &str, point: &str, extracts: &str) -> String {
    format!(
        "Criterion: {}\n\nEvidence question: {}\n\n{}",
        criterion_question, point, extracts
    )
}

/// Final user turn for the main question (and reused by the hypothesis refresh)
pub fn question_section(question: &str, extracts: &str, evidence_answers: &str) -> String {
    format!(
        "Question: {}\n\n{}\nAnswers to the evidence questions: {}",
        question, extracts, evidence_answers
    )
}

pub fn main_question(hypothesis: &str, question: &str, extracts: &str, evidence_answers: &str) -> String {
    format!(
        "{}\n\n{}\n\n{}",
        SYSTEM_QUESTION,
        hypothesis_section(hypothesis),
        question_section(question, extracts, evidence_answers)
    )
}

pub fn regenerate_hypothesis(
    hypothesis: &str,
    question: &str,
    answer: &str,
    extracts: &str,
    evidence_answers: &str,
) -> String {
    format!(
        "{}\n\nYour previous hypotheses about this project were:\n{}\n\n\
         You have just answered this question:\n{}\nYour answer:\n{}\n\n\
         Rewrite your hypotheses about the project in light of the new answer. \
         Keep them short and specific.\n\n{}",
        CORE_PERSONA,
        hypothesis,
        question,
        answer,
        question_section(question, extracts, evidence_answers)
    )
}

/// Join question/answer pairs the way the summary prompt expects
pub fn format_qa_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(q, a)| format!("Question: {}\nAnswer: {}", q, a))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn summarize_responses(pairs: &[(String, String)]) -> String {
    format!(
        "You are a project delivery expert, you will be given question and answer pairs about a \
         government project. Return a summary of the most important themes, you do not need to \
         summarise all the questions, only return important, specific information. Be specific \
         about project detail referred to. Return no more than 3 sentences. {}",
        format_qa_pairs(pairs)
    )
}

pub fn file_info(project_name: &str, file_name: &str, text: &str) -> String {
    format!(
        r#"You are cataloguing documents for the project "{project}".

The file is named "{file}". Its opening text is:

{text}

Respond with a JSON object only, with these fields:
- "clean_name": a short human readable title for the document
- "source": one of "Government", "Supplier" or "Other"
- "summary": a summary of the document in no more than 500 characters
- "published_date": the publication date as YYYY-MM-DD if stated, otherwise null
"#,
        project = project_name,
        file = file_name,
        text = text,
    )
}

/// Retrieval query for chat, optionally anchored on a criterion
pub fn enhanced_query(criterion_question: Option<&str>, text: &str) -> String {
    match criterion_question {
        Some(q) => format!("Criterion: {}\nUser query: {}", q, text),
        None => text.to_string(),
    }
}

pub fn chat_question(context: &str, question: &str) -> String {
    format!("{}\nQuestion: {}\n\nAnswer:", context, question)
}

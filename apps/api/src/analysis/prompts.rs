// Resume analysis LLM prompt templates.
// `{job_title}` and `{job_description}` are substituted verbatim.

pub const ANALYSIS_SYSTEM: &str = "\
You are an expert in ATS (Applicant Tracking Systems) and resume analysis. \
You MUST respond with valid JSON only: no markdown fences, no explanations.";

pub const ANALYSIS_PROMPT: &str = r#"Analyze and rate the attached resume and suggest how to improve it.
The rating can be low if the resume is bad. Be thorough and detailed.
Do not be afraid to point out mistakes or areas for improvement.
If there is a lot to improve, give low scores: the goal is to help the candidate improve.
If a job description is provided, take it into consideration and give feedback specific to that job.

The job title is: {job_title}
The job description is: {job_description}

OUTPUT SCHEMA (return exactly this structure):
{
  "overallScore": number,            // 0-100
  "ATS": {
    "score": number,                 // 0-100, how well the resume passes ATS parsing
    "tips": ["string"]               // 3-4 concrete ATS suggestions
  },
  "toneAndStyle": {
    "score": number,                 // 0-100
    "tips": [{"type": "good" | "improve", "tip": "short headline", "explanation": "detailed explanation"}]
  },
  "content":   { "score": number, "tips": [ ...same tip shape... ] },
  "structure": { "score": number, "tips": [ ...same tip shape... ] },
  "skills":    { "score": number, "tips": [ ...same tip shape... ] }
}

Give 3-4 tips per category. Every tip and explanation must be non-empty.
Return the analysis as a JSON object without any other text and without backticks."#;

/// Fills the job context into the analysis prompt.
///
/// Substitution is a single pass over the template, so placeholder text
/// inside the job context is kept literally.
pub fn prepare_instructions(job_title: &str, job_description: &str) -> String {
    let slots = [
        ("{job_title}", job_title),
        ("{job_description}", job_description),
    ];

    let mut out =
        String::with_capacity(ANALYSIS_PROMPT.len() + job_title.len() + job_description.len());
    let mut rest = ANALYSIS_PROMPT;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        match slots.iter().find(|(slot, _)| rest.starts_with(slot)) {
            Some((slot, value)) => {
                out.push_str(value);
                rest = &rest[slot.len()..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

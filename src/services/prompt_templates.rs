use crate::models::{QueryAnalysis, QueryType};

pub const SYSTEM_PROMPT: &str = "You are a senior business intelligence analyst.";

/// Values substituted into the analysis templates
#[derive(Debug, Clone, Default)]
pub struct PromptInputs<'a> {
    pub enterprise_name: &'a str,
    pub industry: &'a str,
    pub question: &'a str,
    pub context: &'a str,
    pub enterprise_instructions: Option<&'a str>,
    pub department_name: Option<&'a str>,
    pub department_instructions: Option<&'a str>,
    pub user_context: Option<&'a str>,
}

/// Pick the template for the query type and render it
pub fn render_prompt(analysis: &QueryAnalysis, inputs: &PromptInputs<'_>) -> String {
    let mut prompt = match analysis.query_type {
        QueryType::Financial => financial_prompt(inputs, &analysis.date_mentions),
        _ => executive_prompt(inputs),
    };
    append_instructions(&mut prompt, inputs);
    prompt
}

fn executive_prompt(inputs: &PromptInputs<'_>) -> String {
    format!(
        r#"As an AI business analyst for {enterprise}, a {industry} company, analyze the following information and provide insights.

CONTEXT FROM ENTERPRISE DOCUMENTS:
{context}

USER QUESTION: {question}

INSTRUCTIONS:
1. Provide a clear, executive-level summary first
2. Include specific numbers, dates, and data points when available
3. Identify trends, patterns, and anomalies
4. Suggest actionable recommendations
5. Cite the source documents you relied on
6. State any limitations or uncertainties in the data

RESPONSE FORMAT:
📊 EXECUTIVE SUMMARY:
[2-3 sentence summary of key findings]

📈 DETAILED ANALYSIS:
[In-depth analysis with supporting data]

🔍 DATA SOURCES:
[List of documents and sections used]

⚠️ LIMITATIONS:
[Any data gaps or uncertainties]

🎯 RECOMMENDED ACTIONS:
[Specific, actionable next steps]"#,
        enterprise = inputs.enterprise_name,
        industry = inputs.industry,
        context = context_or_placeholder(inputs.context),
        question = inputs.question,
    )
}

fn financial_prompt(inputs: &PromptInputs<'_>, date_mentions: &[String]) -> String {
    let period = if date_mentions.is_empty() {
        "Not specified".to_string()
    } else {
        date_mentions.join(", ")
    };

    format!(
        r#"As a financial analyst, analyze the following financial data and answer the question.

FINANCIAL CONTEXT:
{context}

QUESTION: {question}

ANALYSIS PERIOD: {period}

INSTRUCTIONS:
1. Lead with the key figures and what they mean
2. Break down totals into their components
3. Compare against prior periods when the data allows
4. Highlight risks, variances, and anomalies
5. Keep currency and percentage formatting consistent
6. Say explicitly when a figure is missing from the context

RESPONSE FORMAT:
💰 FINANCIAL SUMMARY:
[Key financial metrics and findings]

📊 DETAILED BREAKDOWN:
[Component-level analysis with numbers]

📈 TRENDS & INSIGHTS:
[Period-over-period movement and drivers]

🚨 ATTENTION ITEMS:
[Risks, variances, and items needing review]"#,
        context = context_or_placeholder(inputs.context),
        question = inputs.question,
        period = period,
    )
}

fn context_or_placeholder(context: &str) -> &str {
    if context.trim().is_empty() {
        "No relevant enterprise documents were found for this question."
    } else {
        context
    }
}

fn append_instructions(prompt: &mut String, inputs: &PromptInputs<'_>) {
    let non_empty = |s: Option<&str>| s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

    if let Some(text) = non_empty(inputs.enterprise_instructions) {
        prompt.push_str("\n\nENTERPRISE GUIDELINES:\n");
        prompt.push_str(&text);
    }

    if let Some(text) = non_empty(inputs.department_instructions) {
        let name = inputs.department_name.unwrap_or("department");
        prompt.push_str(&format!("\n\n{} DEPARTMENT GUIDELINES:\n", name.to_uppercase()));
        prompt.push_str(&text);
    }

    if let Some(text) = non_empty(inputs.user_context) {
        prompt.push_str("\n\nADDITIONAL CONTEXT FROM USER:\n");
        prompt.push_str(&text);
    }
}

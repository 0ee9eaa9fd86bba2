//! Prompt text for the three completion call sites.

use sherlock_core::messages::Message;
use sherlock_core::provider::PromptMessage;

pub fn sql_system_prompt(schema_context: &str) -> String {
    format!(
        "You are an expert SQL analyst. Your sole purpose is to write a single, valid \
         SQLite SQL query to answer the user's question.

- You must use the following database schema to form your query.
- Do not use any tables or columns not listed in this schema.
- Pay close attention to the business descriptions for each table and column, \
   as they contain critical hints about how the data is organized.

**DATABASE SCHEMA:**
{schema_context}

**INSTRUCTIONS:**
1.  Analyze the user's question and the conversation history.
2.  Write a single, syntactically correct SQLite SQL query that directly answers the question.
3.  If a previous query failed, the error is in the conversation. \
    Correct the query instead of repeating it.
4.  **IMPORTANT**: You must only respond with the SQL query itself. Do not include any other text, \
    explanations, or markdown formatting (like ```sql)."
    )
}

/// Conversation entries as chat messages. Tool results are shown to the
/// model as user turns so any OpenAI-compatible endpoint accepts them.
pub fn conversation_messages(conversation: &[Message]) -> Vec<PromptMessage> {
    conversation
        .iter()
        .map(|message| match message {
            Message::User(user) => PromptMessage::user(user.text.clone()),
            Message::Assistant(_) => PromptMessage::assistant(message.text()),
            Message::ToolResult(result) => PromptMessage::user(format!(
                "Result of {}:\n{}",
                result.name, result.content
            )),
        })
        .collect()
}

pub fn synthesis_prompt(question: &str, sql_query: &str, result: &str) -> String {
    format!(
        "Given the user's original question, the corresponding SQL query, \
         and the data result from that query, formulate a friendly, natural language answer.

Original Question: {question}
SQL Query: {sql_query}
Data Result: {result}

Synthesize a final, conversational, and confident answer. Be direct and avoid \
 generic phrases like \"It looks like\"."
    )
}

pub fn chart_prompt(question: &str, columns: &[String]) -> String {
    format!(
        "Given the user's original question and a dataset, choose the best chart \
         type to visualize the answer.
Your choices are: 'bar', 'line', 'pie'.

You must also decide which column(s) from the dataset should be used for the x \
 and y axes (or names and values for a pie chart).

User Question: {question}
Dataset Columns: {columns}

Provide your response as a single line of comma-separated values in the following format:
CHART_TYPE,X_COLUMN,Y_COLUMN
Example: bar,product_name,total_sales
Example: pie,country,customer_count

Your decision:",
        columns = columns.join(", ")
    )
}

//! System instructions for each judgment.

pub const CATEGORY: &str = "You are a helpful assistant that categorizes emails into one of these \
types: Work, Personal, Promotional, or Spam.
Your response must be exactly one of these four words: Work, Personal, Promotional, or Spam.
Do not include any explanations, notes, or additional text.";

pub const URGENCY: &str = "Rate the email's urgency using exactly one of these levels:
- Urgent: Immediate action required (deadlines, emergencies)
- High: Important but not immediate
- Medium: Normal priority
- Low: Can wait

Respond with only the urgency level.";

pub const SUMMARY: &str = "Create a one-line summary of the email's core message.
Focus on actionable content or key information.
Ignore technical elements, images, or formatting.
Be concise and direct.";

pub const REPLY: &str = "You are an assistant helping to draft email replies.
Create a professional and courteous response based on the original email.
Keep the tone appropriate for the email category (formal for work, friendly for personal).
Be concise but complete.
Include:
- Appropriate greeting
- Clear response to the main points
- Professional closing
- Your signature line

Format the response appropriately with line breaks.";

/// User turn for the reply judgment.
pub fn reply_input(body: &str, category: &str, urgency: &str) -> String {
    format!("Original Email Content: {body}\nCategory: {category}\nUrgency: {urgency}")
}

use reqwest::Response;
use serde::{Deserialize, Serialize};

use super::SummaryError;

pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const SYSTEM_PROMPT: &str = r#"Ты — российский эксперт по анализу новостей из Telegram-каналов. Твоя задача — прочитать посты, проанализировать их содержание, отфильтровать кликбейт, слухи, эмоциональный шум, провокации и неподтверждённую информацию. Оставить только факты, подкреплённые достоверными данными.

Сделай краткую выжимку из новостей по следующим правилам:
- Только объективные, проверяемые факты.
- Убери оценки, мнения, гипотезы, предположения.
- Не используй метафоры, эмоциональные выражения, восклицания.
- Сократи текст до 1 предложения на каждую новость.
- Общее количество оставшихся новостей - не более 30% от изначального количества.
- Если новость непроверенная, малозначимая или похожа на слух — проигнорируй её.
- Группируй схожие новости в один пункт.
- Формат: маркированный список, каждый пункт — одна важная новость Между новостями - пустая строка.
- Анализ исключительно на русском языке.
- Учти, твоя работа оценивается очень строго.

Пример вывода:
- [Краткая суть новости, только факты]

- [Ещё одна новость, без лишних деталей]

- [...]
"#;

const USER_PROMPT_PREFIX: &str =
    "Проанализируй следующие посты из Telegram-каналов и выдай краткую выжимку по заданным правилам:\n";

pub fn build_request(model: String, text: &str) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model,
        messages: vec![
            ChatMessage {
                role: "system".into(),
                content: SYSTEM_PROMPT.into(),
            },
            ChatMessage {
                role: "user".into(),
                content: format!("{USER_PROMPT_PREFIX}{text}"),
            },
        ],
        reasoning: Reasoning { enabled: false },
        verbosity: "low".into(),
        temperature: 0.1,
        top_p: 0.5,
    }
}

pub async fn parse_response(response: Response) -> Result<String, SummaryError> {
    let completion: ChatCompletionResponse = response.json().await?;
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .ok_or(SummaryError::Empty)
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub reasoning: Reasoning,
    pub verbosity: String,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct Reasoning {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: Option<ChatCompletionMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionMessage {
    pub content: Option<String>,
}

//! Prompt templates for Svar.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub answer: AnswerPrompts,
    pub suggest: SuggestPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for grounded answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerPrompts {
    /// Used when retrieved chunks are present and no auxiliary context.
    pub grounded: String,
    /// Used when both retrieved chunks and auxiliary context are present.
    pub grounded_with_aux: String,
    /// Used when only auxiliary context is present.
    pub aux_only: String,
}

impl Default for AnswerPrompts {
    fn default() -> Self {
        Self {
            grounded: r#"以下の情報をもとに質問に回答してください。情報に含まれていない内容については回答しないでください。

## 参考情報
{{context}}

## 質問
{{question}}"#
                .to_string(),

            grounded_with_aux: r#"以下の情報をもとに質問に回答してください。情報に含まれていない内容については回答しないでください。
補足情報はあくまで参考情報を補うものとして扱ってください。

## 参考情報
{{context}}

## 補足情報（天気予報）
{{aux}}

## 質問
{{question}}"#
                .to_string(),

            aux_only: r#"以下の天気予報をもとに、質問に合わせて内容を整理して回答してください。予報に含まれていない内容を推測して回答しないでください。

## 天気予報
{{aux}}

## 質問
{{question}}"#
                .to_string(),
        }
    }
}

/// Prompt for follow-up question suggestions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestPrompts {
    pub template: String,
}

impl Default for SuggestPrompts {
    fn default() -> Self {
        Self {
            template: r#"以下の質問・回答・参考情報のテーマをもとに、ユーザーが次に聞きたくなりそうな短いフォローアップ質問を最大3つ提案してください。
出力は文字列のJSON配列のみとしてください。例: ["質問1", "質問2", "質問3"]

## 質問
{{question}}

## 回答
{{answer}}

## 参考情報のテーマ
{{themes}}"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let answer_path = custom_path.join("answer.toml");
            if answer_path.exists() {
                let content = std::fs::read_to_string(&answer_path)?;
                prompts.answer = toml::from_str(&content)?;
            }

            let suggest_path = custom_path.join("suggest.toml");
            if suggest_path.exists() {
                let content = std::fs::read_to_string(&suggest_path)?;
                prompts.suggest = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

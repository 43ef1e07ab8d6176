//! User-facing message tables.
//!
//! Two built-in tables (`cn`, the default, and `en`) plus an optional custom
//! JSON table keyed by message id. Texts use `%s` for the first argument and
//! `%2s` for the second.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Identifier of a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageId {
    DuplicateRegexFound,
    DuplicateRegexFoundQuestion,
    InvalidRegex,
    EmptyCdnConfig,
    EmptyAccessOrSecret,
    LanguageLoadFailed,
    InvalidCdnOptionsLoaded,
    CdnTypeNotSupported,
    DeletePreviousEnabled,
    PreviousLogNotExists,
    InvalidPreviousLogFile,
    EmptyPreviousLogFile,
    DeletedNumPreviousFiles,
    SkipDeletePreviousDueTo,
    EmptyUploadingFiles,
    UploadStart,
    SingleFileUploaded,
    LoadingFileError,
    UploadingError,
    AllFileUploaded,
    DeleteOutputEnabled,
    SavingLogError,
    InvalidFtpDestPath,
    SummaryTitle,
    SummaryTotal,
    SummaryUploaded,
    SummaryErrors,
}

const EN: &[(MessageId, &str)] = &[
    (MessageId::DuplicateRegexFound, "Upload task terminated due to duplicate Regex pattern found"),
    (MessageId::DuplicateRegexFoundQuestion, "Duplicate Regex pattern found, continue? (y/n):"),
    (MessageId::InvalidRegex, "Invalid regex pattern"),
    (MessageId::EmptyCdnConfig, "Empty CDN upload config"),
    (MessageId::EmptyAccessOrSecret, "Empty %s access key or secret key"),
    (MessageId::LanguageLoadFailed, "Invalid custom language file \"%s\", using default output language"),
    (MessageId::InvalidCdnOptionsLoaded, "Invalid cdn options loaded, please check your CDN options and recompile: %s"),
    (MessageId::CdnTypeNotSupported, "Not supported CDN type"),
    (MessageId::DeletePreviousEnabled, "<deletePrevious> option enabled, Deleting previous resources..."),
    (MessageId::PreviousLogNotExists, "Previous log file doesn't exist."),
    (MessageId::InvalidPreviousLogFile, "Invalid previous log file"),
    (MessageId::EmptyPreviousLogFile, "Empty previous uploaded file"),
    (MessageId::DeletedNumPreviousFiles, "Deleted %s previous bundle files"),
    (MessageId::SkipDeletePreviousDueTo, "Skip to delete previous files due to: %s"),
    (MessageId::EmptyUploadingFiles, "No uploading files found, check regex test option if there are any issues"),
    (MessageId::UploadStart, "Uploading bundle files to selected CDN..."),
    (MessageId::SingleFileUploaded, "File uploaded"),
    (MessageId::LoadingFileError, "Error happened while loading file %s due to %2s, please try to recompile"),
    (MessageId::UploadingError, "Error happened while uploading file %s due to %2s, please try to recompile"),
    (MessageId::AllFileUploaded, "All bundle files have been uploaded successfully"),
    (MessageId::DeleteOutputEnabled, "<deleteOutput> option enabled, all output files are deleted"),
    (MessageId::SavingLogError, "Error happened while saving uploaded log due to: %s"),
    (MessageId::InvalidFtpDestPath, "Invalid ftp destination path"),
    (MessageId::SummaryTitle, "UPLOAD RESULT:"),
    (MessageId::SummaryTotal, "Total:%s"),
    (MessageId::SummaryUploaded, "Uploaded:%s"),
    (MessageId::SummaryErrors, "Errors:%s"),
];

const CN: &[(MessageId, &str)] = &[
    (MessageId::DuplicateRegexFound, "发现重复CDN正则匹配, 已取消上传任务"),
    (MessageId::DuplicateRegexFoundQuestion, "发现重复CDN正则匹配, 是否继续? (y/n):"),
    (MessageId::InvalidRegex, "无效正则匹配参数"),
    (MessageId::EmptyCdnConfig, "CDN参数为空"),
    (MessageId::EmptyAccessOrSecret, "%s Access Key或Secret Key为空"),
    (MessageId::LanguageLoadFailed, "无效自定义文件\"%s\", 使用默认输出语言"),
    (MessageId::InvalidCdnOptionsLoaded, "无效CDN参数, 请检查并重新打包: %s"),
    (MessageId::CdnTypeNotSupported, "暂不支持所选CDN类型"),
    (MessageId::DeletePreviousEnabled, "<deletePrevious>选项为开启, 正在删除过往上传文件..."),
    (MessageId::PreviousLogNotExists, "过往上传记录文件不存在"),
    (MessageId::InvalidPreviousLogFile, "无效上传记录文件"),
    (MessageId::EmptyPreviousLogFile, "以往上传记录中文件列表为空"),
    (MessageId::DeletedNumPreviousFiles, "已删除%s个过往上传文件"),
    (MessageId::SkipDeletePreviousDueTo, "已跳过删除过往文件, 因为: %s"),
    (MessageId::EmptyUploadingFiles, "无任何需要上传文件, 如有问题请检查正则匹配参数"),
    (MessageId::UploadStart, "开始上传打包文件至CDN..."),
    (MessageId::SingleFileUploaded, "文件已上传"),
    (MessageId::LoadingFileError, "读取文件%s出错: %2s, 上传中断请尝试重新打包"),
    (MessageId::UploadingError, "CDN上传出错: %s, 因为: %2s ,上传中断请尝试重新打包"),
    (MessageId::AllFileUploaded, "所有打包文件已上传成功"),
    (MessageId::DeleteOutputEnabled, "<deleteOutput>选项为开启, 已删除所有输出文件"),
    (MessageId::SavingLogError, "保存上传记录失败, 因为: %s"),
    (MessageId::InvalidFtpDestPath, "请提供ftp上传目录"),
    (MessageId::SummaryTitle, "上传记录:"),
    (MessageId::SummaryTotal, "总任务%s"),
    (MessageId::SummaryUploaded, "已上传%s"),
    (MessageId::SummaryErrors, "出错%s"),
];

/// Language selected by the `lang` option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lang {
    Cn,
    En,
    /// Path to a custom JSON table
    Custom(String),
}

impl Lang {
    pub fn from_option(lang: Option<&str>) -> Self {
        match lang {
            None | Some("cn") => Lang::Cn,
            Some("en") => Lang::En,
            Some(path) => Lang::Custom(path.to_string()),
        }
    }
}

/// A resolved message table.
#[derive(Debug, Clone)]
pub struct Messages {
    table: HashMap<MessageId, String>,
}

impl Default for Messages {
    fn default() -> Self {
        Self::builtin(&Lang::Cn)
    }
}

fn to_table(entries: &[(MessageId, &str)]) -> HashMap<MessageId, String> {
    entries
        .iter()
        .map(|(id, text)| (*id, text.to_string()))
        .collect()
}

impl Messages {
    fn builtin(lang: &Lang) -> Self {
        let table = match lang {
            Lang::En => to_table(EN),
            _ => to_table(CN),
        };
        Self { table }
    }

    /// Built-in English table.
    pub fn en() -> Self {
        Self::builtin(&Lang::En)
    }

    /// Built-in Chinese table.
    pub fn cn() -> Self {
        Self::builtin(&Lang::Cn)
    }

    /// Resolve the table for a `lang` option value.
    ///
    /// A custom table overrides English entries; when it cannot be loaded the
    /// English table is used and a warning is logged.
    pub fn load(lang: Option<&str>) -> Self {
        match Lang::from_option(lang) {
            Lang::Custom(path) => match Self::read_custom(Path::new(&path)) {
                Ok(custom) => {
                    let mut messages = Self::en();
                    messages.table.extend(custom);
                    messages
                }
                Err(reason) => {
                    let messages = Self::en();
                    warn!(
                        reason = %reason,
                        "{}",
                        messages.format(MessageId::LanguageLoadFailed, &[&path])
                    );
                    messages
                }
            },
            builtin => Self::builtin(&builtin),
        }
    }

    fn read_custom(path: &Path) -> Result<HashMap<MessageId, String>, String> {
        let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        let entries: HashMap<String, serde_json::Value> =
            serde_json::from_str(&raw).map_err(|e| e.to_string())?;

        // Unknown keys and non-string values are ignored.
        Ok(entries
            .into_iter()
            .filter_map(|(key, value)| {
                let id = serde_json::from_value::<MessageId>(serde_json::Value::String(key)).ok()?;
                Some((id, value.as_str()?.to_string()))
            })
            .collect())
    }

    /// Raw text of a message.
    pub fn get(&self, id: MessageId) -> &str {
        self.table.get(&id).map(String::as_str).unwrap_or_default()
    }

    /// Text with `%s` and `%2s` replaced by the first two arguments.
    pub fn format(&self, id: MessageId, args: &[&str]) -> String {
        let mut text = self.get(id).to_string();
        if let Some(first) = args.first() {
            text = text.replacen("%s", first, 1);
        }
        if let Some(second) = args.get(1) {
            text = text.replacen("%2s", second, 1);
        }
        text
    }
}

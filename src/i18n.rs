//! Localized messages shown to the user.

use serde::{Deserialize, Serialize};

use crate::{classifier::UserFacingCategory, validator::ValidationError};

/// UI language. English is the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    En,
    Zh,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::En, Language::Zh];

    /// Stored code, e.g. `en`.
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.code() == code.trim())
    }

    /// The next language in display order.
    pub fn next(self) -> Self {
        match self {
            Language::En => Language::Zh,
            Language::Zh => Language::En,
        }
    }

    pub fn texts(self) -> &'static Texts {
        match self {
            Language::En => &EN,
            Language::Zh => &ZH,
        }
    }
}

/// String table for one language.
#[derive(Debug)]
pub struct Texts {
    pub select_file: &'static str,
    pub invalid_file_type: &'static str,
    /// `{max}` is replaced with the cap in MB.
    pub file_too_large: &'static str,
    /// Used when the backend did not say which cap applied.
    pub file_too_large_generic: &'static str,
    pub processing_failed: &'static str,
    pub network_error: &'static str,
    pub server_timeout: &'static str,
    pub server_error: &'static str,
    pub api_key_missing: &'static str,
    pub processing: &'static str,
    pub processing_hint: &'static str,
    pub upload_prompt: &'static str,
    pub upload_new: &'static str,
    pub busy: &'static str,
    pub download_error: &'static str,
    pub background_title: &'static str,
    pub watermark_title: &'static str,
}

static EN: Texts = Texts {
    select_file: "Please select a file",
    invalid_file_type: "Please select a valid image file (JPG, PNG, or WEBP)",
    file_too_large: "File is too large. Maximum size is {max}MB",
    file_too_large_generic: "File is too large",
    processing_failed: "Failed to process image. Please try again",
    network_error: "Network error. Please check your connection",
    server_timeout: "The server took too long to respond. Please try again later",
    server_error: "Server error. Please try again later",
    api_key_missing: "API key is not configured. Please contact administrator",
    processing: "Processing image...",
    processing_hint: "This may take a few seconds",
    upload_prompt: "Select a file to start",
    upload_new: "Or upload a new image",
    busy: "An image is already being processed",
    download_error: "Download failed. Please try again",
    background_title: "Background Remover",
    watermark_title: "Watermark Remover",
};

static ZH: Texts = Texts {
    select_file: "请选择文件",
    invalid_file_type: "请选择有效的图片文件（JPG、PNG 或 WEBP）",
    file_too_large: "文件过大，最大支持 {max}MB",
    file_too_large_generic: "文件过大",
    processing_failed: "图片处理失败，请重试",
    network_error: "网络错误，请检查网络连接",
    server_timeout: "服务器响应超时，请稍后重试",
    server_error: "服务器错误，请稍后重试",
    api_key_missing: "API 密钥未配置，请联系管理员",
    processing: "正在处理图片...",
    processing_hint: "这可能需要几秒钟",
    upload_prompt: "选择文件开始处理",
    upload_new: "或上传新图片",
    busy: "已有图片正在处理中",
    download_error: "下载失败，请重试",
    background_title: "背景去除",
    watermark_title: "去水印",
};

/// Message for a classified failure.
pub fn category_message(lang: Language, category: UserFacingCategory) -> &'static str {
    let t = lang.texts();
    match category {
        UserFacingCategory::ApiKeyMissing => t.api_key_missing,
        UserFacingCategory::FileTooLarge => t.file_too_large_generic,
        UserFacingCategory::NetworkError => t.network_error,
        UserFacingCategory::ServerTimeout => t.server_timeout,
        UserFacingCategory::ServerError => t.server_error,
        UserFacingCategory::ProcessingFailed => t.processing_failed,
    }
}

/// Message for a rejected selection.
pub fn rejection_message(lang: Language, err: &ValidationError) -> String {
    let t = lang.texts();
    match err {
        ValidationError::MissingFile => t.select_file.to_string(),
        ValidationError::UnsupportedType { .. } => t.invalid_file_type.to_string(),
        ValidationError::TooLarge { max, .. } => {
            t.file_too_large
                .replace("{max}", &(max / (1024 * 1024)).to_string())
        }
    }
}

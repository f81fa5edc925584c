// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static PROFILE_USERNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/in/([^/?#]+)").expect("valid profile username pattern"));

/// 从主页URL中提取用户名
///
/// 取 `/in/<username>` 段并转为小写，不匹配时返回 `None`
pub fn profile_username(url: &str) -> Option<String> {
    PROFILE_USERNAME
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
        .filter(|name| !name.is_empty())
}

/// 将提取脚本返回的标识归一化为用户名
///
/// 接受完整主页URL或裸用户名两种形式
pub fn normalize_identifier(identifier: &str) -> Option<String> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("/in/") {
        return profile_username(trimmed);
    }
    let bare = trimmed.trim_matches('/').to_lowercase();
    (!bare.is_empty() && !bare.contains('/')).then_some(bare)
}

/// 去掉查询参数、片段和结尾斜杠，得到规范化的主页URL
///
/// 无法解析时原样返回
pub fn normalize_profile_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            let path = url.path().trim_end_matches('/').to_string();
            url.set_path(&path);
            url.to_string().trim_end_matches('/').to_string()
        }
        Err(_) => raw.trim().to_string(),
    }
}

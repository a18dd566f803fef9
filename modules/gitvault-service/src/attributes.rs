//! Growth attributes detected from activity titles.

/// Display order of the six attribute families
pub const ATTRIBUTE_ORDER: [&str; 6] = ["C", "R", "E", "A", "T", "EV"];

const KEYWORDS: [(&str, &[&str]); 6] = [
    (
        "C",
        &[
            "閱讀", "研究", "學習", "分析", "提問", "探索", "課程", "訪談", "觀察", "資料", "好奇", "聽", "看", "訪綱",
            "問卷", "使用者研究", "勘查",
        ],
    ),
    (
        "R",
        &[
            "健身", "運動", "訓練", "營養", "睡眠", "冥想", "休息", "復盤", "反思", "挑戰", "日誌", "週記", "日記",
            "心態", "檢討", "堅持",
        ],
    ),
    (
        "E",
        &[
            "分享", "敘事", "演說", "溝通", "錄製", "發表", "文案", "草稿", "演講", "對話", "回覆", "社群", "寫",
            "剪輯", "podcast", "影片", "直播",
        ],
    ),
    (
        "A",
        &[
            "建構", "執行", "實作", "開發", "程式", "code", "設計", "製作", "vibecoding", "原型", "prototype", "部署",
            "發佈", "動手做",
        ],
    ),
    (
        "T",
        &[
            "整合", "思考", "規劃", "大綱", "整理", "筆記", "心智圖", "框架", "結構", "策略", "連結", "分類", "歸納",
            "模型", "假設", "推演",
        ],
    ),
    (
        "EV",
        &[
            "適應", "優化", "迭代", "重構", "學習新工具", "自動化", "流程", "升級", "更新", "實驗", "測試", "debug",
            "效率",
        ],
    ),
];

pub fn label(key: &str) -> Option<&'static str> {
    match key {
        "C" => Some("Curiosity"),
        "R" => Some("Resilience"),
        "E" => Some("Expression"),
        "A" => Some("Action"),
        "T" => Some("Thinking"),
        "EV" => Some("Evolution"),
        _ => None,
    }
}

/// Attribute keys whose keywords occur in `text`, in display order.
pub fn detect(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    KEYWORDS
        .iter()
        .filter(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(key, _)| key.to_string())
        .collect()
}

/// Keep known keys only, deduplicated, in display order.
pub fn normalize(keys: &[String]) -> Vec<String> {
    ATTRIBUTE_ORDER
        .iter()
        .filter(|k| keys.iter().any(|given| given.trim().eq_ignore_ascii_case(k)))
        .map(|k| k.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_matches_keywords() {
        assert_eq!(detect("深度閱讀"), vec!["C"]);
        assert_eq!(detect("Refactor CODE and write tests"), vec!["A"]);
        assert_eq!(detect("規劃 prototype 並優化流程"), vec!["A", "T", "EV"]);
        assert!(detect("lunch").is_empty());
    }

    #[test]
    fn test_normalize() {
        let given = vec!["ev".to_string(), "C".to_string(), "X".to_string(), "C".to_string()];
        assert_eq!(normalize(&given), vec!["C", "EV"]);
    }

    #[test]
    fn test_every_key_has_a_label() {
        for key in ATTRIBUTE_ORDER {
            assert!(label(key).is_some());
        }
    }
}

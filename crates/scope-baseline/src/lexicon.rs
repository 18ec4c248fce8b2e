//! Keyword lexicon: categories, scope qualifiers and priority markers
//!
//! ASCII markers match at a word start (so `notif` style stems also catch
//! `notifications`); markers of three letters or fewer must match a whole
//! word. Han markers match as substrings.

use once_cell::sync::Lazy;
use regex::Regex;
use scope_model::{Priority, RequirementScope};

/// Fallback category when no marker matches
pub const GENERAL_CATEGORY: &str = "general";

/// A requirement category and the markers that signal it
#[derive(Debug, Clone, Copy)]
pub struct Category {
    pub name: &'static str,
    /// A task touching this category adds capability the baseline must cover
    pub expands_scope: bool,
    pub markers: &'static [&'static str],
}

/// Categories in detection order, most specific first
pub const CATEGORIES: &[Category] = &[
    Category {
        name: "authentication",
        expands_scope: true,
        markers: &[
            "登录", "登陆", "注册", "认证", "密码", "单点登录", "login", "log in", "logout",
            "sign in", "signin", "sign up", "signup", "register", "registration",
            "authenticat", "password", "oauth", "sso", "2fa", "mfa",
        ],
    },
    Category {
        name: "authorization",
        expands_scope: true,
        markers: &["权限", "角色", "授权", "permission", "rbac", "authoriz", "access control"],
    },
    Category {
        name: "payment",
        expands_scope: true,
        markers: &[
            "支付", "付款", "收款", "退款", "计费", "账单", "订阅", "payment", "billing",
            "checkout", "invoice", "refund", "subscription",
        ],
    },
    Category {
        name: "notification",
        expands_scope: true,
        markers: &[
            "通知", "提醒", "推送", "邮件", "短信", "notification", "notify", "reminder",
            "email", "sms", "alert",
        ],
    },
    Category {
        name: "reporting",
        expands_scope: true,
        markers: &[
            "报表", "报告", "统计", "图表", "仪表盘", "report", "analytics", "dashboard",
            "chart", "statistic", "metric",
        ],
    },
    Category {
        name: "search",
        expands_scope: true,
        markers: &["搜索", "检索", "筛选", "search", "filter", "query"],
    },
    Category {
        name: "collaboration",
        expands_scope: true,
        markers: &[
            "协作", "评论", "共享", "分享", "团队", "collaborat", "comment", "share", "sharing",
            "team", "mention",
        ],
    },
    Category {
        name: "integration",
        expands_scope: true,
        markers: &[
            "集成", "对接", "第三方", "导入", "导出", "webhook", "integrat", "import",
            "export", "third-party", "api",
        ],
    },
    Category {
        name: "performance",
        expands_scope: false,
        markers: &[
            "性能", "响应时间", "加载时间", "并发", "延迟", "吞吐", "performance", "latency",
            "throughput", "response time", "load time", "concurren",
        ],
    },
    Category {
        name: "security",
        expands_scope: true,
        markers: &["安全", "加密", "审计", "漏洞", "security", "secure", "encrypt", "audit", "vulnerab", "xss", "csrf"],
    },
    Category {
        name: "data",
        expands_scope: false,
        markers: &["数据库", "存储", "备份", "持久化", "database", "storage", "backup", "persist", "migration"],
    },
    Category {
        name: "task-management",
        expands_scope: false,
        markers: &["任务", "待办", "工作项", "看板", "task", "todo", "to-do", "backlog", "kanban"],
    },
    Category {
        name: "user-interface",
        expands_scope: false,
        markers: &["界面", "页面", "交互", "前端", "布局", "主题", "ui", "ux", "interface", "layout", "frontend", "front-end", "theme"],
    },
];

const OPTIONAL_MARKERS: &[&str] = &[
    "可选", "未来", "后续", "二期", "远期", "锦上添花", "如有时间", "optional", "future",
    "nice to have", "nice-to-have", "stretch goal", "later phase",
];

const HIGH_PRIORITY_MARKERS: &[&str] = &[
    "高优先级", "优先级：高", "优先级:高", "必须", "关键", "must have", "must-have", "critical",
    "high priority", "[high]", "(high)",
];

const LOW_PRIORITY_MARKERS: &[&str] = &[
    "低优先级", "优先级：低", "优先级:低", "次要", "low priority", "[low]", "(low)",
];

const MEDIUM_PRIORITY_MARKERS: &[&str] = &["中优先级", "优先级：中", "优先级:中", "medium priority"];

static P_LEVEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])p([0-3])(?:$|[^a-z0-9])").expect("static P-level pattern")
});

/// Whether `marker` occurs in `text` (both already lowercased)
#[must_use]
pub fn contains_marker(text: &str, marker: &str) -> bool {
    if !marker.is_ascii() {
        return text.contains(marker);
    }
    let whole_word = marker.len() <= 3;
    text.match_indices(marker).any(|(start, _)| {
        let before_ok = text[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_ascii_alphanumeric());
        let after_ok = !whole_word
            || text[start + marker.len()..]
                .chars()
                .next()
                .map_or(true, |c| !c.is_ascii_alphanumeric());
        before_ok && after_ok
    })
}

fn any_marker(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| contains_marker(text, m))
}

/// Every category signalled in `text`, in lexicon order
#[must_use]
pub fn detect_categories(text: &str) -> Vec<&'static Category> {
    let lower = text.to_lowercase();
    CATEGORIES
        .iter()
        .filter(|c| any_marker(&lower, c.markers))
        .collect()
}

/// First category signalled in `text`
#[must_use]
pub fn primary_category(text: &str) -> Option<&'static str> {
    detect_categories(text).first().map(|c| c.name)
}

/// Lookup a category by name
#[must_use]
pub fn category(name: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.name == name)
}

/// Qualifying language that demotes an item to `optional`
#[must_use]
pub fn qualified_scope(text: &str, default: RequirementScope) -> RequirementScope {
    if any_marker(&text.to_lowercase(), OPTIONAL_MARKERS) {
        RequirementScope::Optional
    } else {
        default
    }
}

/// Explicit priority markers; `medium` when none
#[must_use]
pub fn detect_priority(text: &str) -> Priority {
    let lower = text.to_lowercase();
    let p_level = P_LEVEL
        .captures(&lower)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str());

    if any_marker(&lower, HIGH_PRIORITY_MARKERS) || matches!(p_level, Some("0" | "1")) {
        Priority::High
    } else if any_marker(&lower, LOW_PRIORITY_MARKERS) || p_level == Some("3") {
        Priority::Low
    } else if any_marker(&lower, MEDIUM_PRIORITY_MARKERS) || p_level == Some("2") {
        Priority::Medium
    } else {
        Priority::default()
    }
}

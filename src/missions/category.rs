use crate::missions::dto::MissionCategory;

/// Display style for a mission category. Shared by every consumer instead of
/// per-screen lookup tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryStyle {
    pub label: &'static str,
    pub icon: &'static str,
    pub bg: &'static str,
    pub text: &'static str,
    pub dot: &'static str,
    pub light: &'static str,
}

pub fn style_for(category: MissionCategory) -> &'static CategoryStyle {
    match category {
        MissionCategory::Cleanup => &CategoryStyle {
            label: "Nettoyage",
            icon: "water",
            bg: "#3b82f6",
            text: "#1d4ed8",
            dot: "#3b82f6",
            light: "#eff6ff",
        },
        MissionCategory::Planting => &CategoryStyle {
            label: "Plantation",
            icon: "flower",
            bg: "#10b981",
            text: "#047857",
            dot: "#10b981",
            light: "#ecfdf5",
        },
        MissionCategory::Workshop => &CategoryStyle {
            label: "Atelier",
            icon: "construct",
            bg: "#f59e0b",
            text: "#b45309",
            dot: "#f59e0b",
            light: "#fffbeb",
        },
        MissionCategory::Awareness => &CategoryStyle {
            label: "Sensibilisation",
            icon: "megaphone",
            bg: "#ec4899",
            text: "#be185d",
            dot: "#ec4899",
            light: "#fdf2f8",
        },
    }
}

pub const RESULTS_FILE_NAME: &str = "results.json";
pub const SCREENSHOTS_DIR: &str = "__screenshots__";

pub fn check_prefix(check_id: &str) -> String {
    format!("checks/{}", check_id.trim_matches('/'))
}

pub fn report_prefix(check_id: &str) -> String {
    format!("{}/report", check_prefix(check_id))
}

pub fn report_object_key(check_id: &str, relative_path: &str) -> String {
    format!(
        "{}/{}",
        report_prefix(check_id),
        relative_path.trim_start_matches('/')
    )
}

pub fn results_object_key(check_id: &str) -> String {
    report_object_key(check_id, RESULTS_FILE_NAME)
}

pub fn frame_relative_path(story: &str) -> String {
    format!("frames/{story}.png")
}

/// Screenshot location storycap writes for a story, relative to the repo.
pub fn screenshot_relative_path(path: &str, component: &str, story: &str) -> String {
    format!("{SCREENSHOTS_DIR}/{path}/{component}/{story}.png")
}

/// Story source file for a component, e.g. `Example/Button` + `Button`
/// resolves to `src/app/button/example/Button/Button.stories.tsx`.
pub fn story_source_path(path: &str, component: &str) -> String {
    let reversed = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .rev()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("/");
    format!("src/app/{reversed}/{component}/{component}.stories.tsx")
}

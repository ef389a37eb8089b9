/// Sanitises admin-authored survey descriptions, which renderers may show as HTML.
///
/// Safe formatting tags (<b>, <p>, lists) survive; scripts, iframes and event
/// handler attributes are removed. Titles, question and option texts are plain
/// text and are not passed through here.
pub fn clean_description(input: Option<&str>) -> Option<String> {
    input
        .map(|raw| ammonia::clean(raw.trim()))
        .filter(|cleaned| !cleaned.is_empty())
}

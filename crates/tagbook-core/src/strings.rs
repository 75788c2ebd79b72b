/// The built-in UI vocabulary plus document metadata collected from the
/// `<doc>` block. Every label can be overridden per document, which is the
/// whole of the localization story here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Strings {
    pub lang: String,
    pub titleimg_alt: String,
    pub title: String,
    pub url: String,
    pub version: String,
    pub search_results: String,
    pub home: String,
    pub permalink: String,
    pub info: String,
    pub hint: String,
    pub note: String,
    pub also: String,
    pub todo: String,
    pub warn: String,
    pub args: String,
    pub rval: String,
    pub prev: String,
    pub next: String,
    pub copyright: String,
}

impl Default for Strings {
    fn default() -> Self {
        Self {
            lang: "en".into(),
            titleimg_alt: String::new(),
            title: String::new(),
            url: "#".into(),
            version: "stable".into(),
            search_results: "Search Results".into(),
            home: "Home".into(),
            permalink: "Permalink to this headline".into(),
            info: "Important".into(),
            hint: "Hint".into(),
            note: "Note".into(),
            also: "See Also".into(),
            todo: "To Do".into(),
            warn: "Warning".into(),
            args: "Arguments".into(),
            rval: "Return Value".into(),
            prev: "Previous".into(),
            next: "Next".into(),
            copyright: "unknown".into(),
        }
    }
}

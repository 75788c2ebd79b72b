//! The final templating stage: wraps the parsed body in a self-contained
//! HTML document with embedded CSS, the navigation sidebar built from the
//! table of contents, the per-page display logic, and the small vanilla
//! search/page-switching script. Everything ends up in one file.

use std::fs;

use tagbook_core::{
    Diagnostic, DiagnosticSeverity, E_RESOURCE, EmbeddedImage, GenerateResult, TocEntry,
};

use crate::image::probe_image;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Colors only; the structural rules live in LOGIC_CSS so a theme can stay
// small.
const DEFAULT_THEME: &str = "hr,table,th,td{border-color:#e1e4e5;}\n\
th{background:#d6d6d6;}\n\
tr:nth-child(odd){background:#f3f6f6;}\n\
a{text-decoration:none;color:#2980B9;}\n\
.content{background:#fcfcfc;color:#404040;font-family:Lato,Helvetica,Neue,Arial,Deja Vu,sans-serif;}\n\
.title,.home,h1>a,h2>a,h3>a,h4>a,h5>a,h6>a{background:#2980B9;color:#fcfcfc;}\n\
.version{color:rgba(255,255,255,0.3);}\n\
.search{border:1px solid #2472a4;background:#fcfcfc;}\n\
.nav{background:#343131;color:#d9d9d9;}\n\
.nav p{color:#55a5d9;}\n\
.nav label:hover,.nav a:hover{background:#4e4a4a;}\n\
.nav .current{background:#fcfcfc;color:#404040;}\n\
.nav li>ul>li{background:#e3e3e3;}\n\
.nav li>ul>li>a{color:#404040;}\n\
.nav li>ul>li>a:hover{background:#d6d6d6;}\n\
.pre{border:1px solid #e1e4e5;background:#f8f8f8;}\n\
.info{background:#e7f2fa;}\n\
.info>p:first-child{background:#6ab0de;color:#fff;}\n\
.hint{background:#dbfaf4;}\n\
.hint>p:first-child{background:#1abc9c;color:#fff;}\n\
.warn{background:#ffedcc;}\n\
.warn>p:first-child{background:#f0b37e;color:#fff;}\n\
.btn{background:#f3f6f6;}\n\
.btn:hover{background:#e5ebeb;}\n\
.hl_h{background-color:#ccffcc;}\n\
.hl_c{color:#808080;font-style:italic;}\n\
.hl_p{color:#1f7199;}\n\
.hl_o{color:#404040;}\n\
.hl_n{color:#0164eb;}\n\
.hl_s{color:#986801;}\n\
.hl_t{color:#60A050;}\n\
.hl_k{color:#a626a4;}\n\
.hl_f{color:#2a9292;}\n\
.hl_v{color:#e95649;}\n";

const LOGIC_CSS: &str = "*{box-sizing:border-box;font-family:inherit;}\
body{background:rgba(0,0,0,0.05);font-weight:400;font-size:16px;margin:0;}\
hr{display:block;height:1px;border:0;border-top:1px solid;margin:26px 0;padding:0;}\
h1,h2,h3,h4,h5,h6{clear:both;margin:0 0 20px 0;padding-top:4px;}\
h1{font-size:175%}h2{font-size:150%}h3{font-size:125%}h4{font-size:115%}h5{font-size:110%}h6{font-size:100%}\
p{margin:0 0 24px}a{cursor:pointer;}\
pre,samp,code,kbd{font-family:Monaco,Consolas,Liberation Mono,Courier,monospace;font-variant-ligatures:none;}\
pre,code{display:block;overflow:auto;white-space:pre;font-size:14px;line-height:16px!important;}pre{padding:12px;margin:0;}\
code{padding:0 0 12px 0;margin:12px 12px 0 2px;}\
.lineno{display:block;padding:0 4px;margin:12px 0 0 0;opacity:.4;text-align:right;float:left;white-space:pre;font-size:12px;line-height:16px!important;}\
pre .hl_b,samp .hl_b,code .hl_b{display:block;}\
blockquote{margin:0;padding:12px;}\
.ui1,.ui2,.ui3,.ui4,.ui5,.ui6{display:inline-block;height:24px!important;line-height:24px!important;padding:0 4px;margin:-2px 0;}\
kbd{display:inline-block;font-weight:700;border:1px solid #888;height:24px!important;padding:0 4px;margin:-2px 0;border-radius:4px;}\
.mouseleft,.mouseright,.mousewheel{display:inline-block;min-width:16px;height:24px!important;vertical-align:middle;}\
dl{margin:0 0 24px 0;padding:0;}dt{font-weight:700;margin-bottom:12px;}dd{margin:0 0 12px 24px;}\
.table table{margin:0;border-collapse:collapse;border-spacing:0;empty-cells:show;border:1px solid;width:100%;}\
th{font-weight:700;padding:8px 16px;vertical-align:middle;white-space:nowrap;border:1px solid;}th.wide{width:100%;}\
td{padding:8px 16px;vertical-align:middle;font-size:90%;border:1px solid;}td.right{text-align:right;}\
table.grid{margin:0;padding:0;border:none!important;background:none!important;border-spacing:0;empty-cells:show;width:100%;}\
table.grid tr,table.grid td{margin:0;padding:0;overflow:hidden;vertical-align:top;background:none!important;border:0!important;font-size:90%;}\
div.frame{position:absolute;width:100%;min-height:100%;margin:0;padding:0;max-width:1100px;top:0;left:0;}\
#_m{margin-left:300px;min-height:100%;}\
div.title{display:block;width:300px;padding:.809em 0;margin-bottom:.809em;text-align:center;font-weight:700;}\
div.title>a{padding:4px 6px;font-size:150%;}div.title>a>img{max-width:280px;border:0;}\
div.title input{display:none;width:270px;border-radius:50px;padding:6px 12px;font-size:80%;}\
div.version{margin:.4045em 0 .809em 0;font-size:90%;}\
nav.side{display:block;position:fixed;top:0;bottom:0;left:0;width:300px;overflow:hidden;min-height:100%;z-index:999;}\
nav.mobile{display:none;font-weight:bold;padding:.4045em .809em;position:relative;line-height:50px;text-align:center;}\
nav a{color:inherit;text-decoration:none;display:block;}\
nav.side>div{position:relative;overflow-x:hidden;overflow-y:scroll;width:320px;height:100%;padding-bottom:64px;}\
div.nav p{height:32px;line-height:32px;padding:0 1.618em;margin:12px 0 0 0;font-weight:700;text-transform:uppercase;font-size:85%;white-space:nowrap;}\
div.nav li>.current,div.nav li>ul{display:none;}\
div.nav li>a,div.nav li>label{display:block;}\
div.nav a,div.nav ul>li>label,div.nav ul>li>.current{width:300px;line-height:18px;padding:.4045em 1.618em;}\
div.nav a,div.nav ul>li>label{cursor:pointer;}\
div.nav .current{font-weight:700;border-top:1px solid;border-bottom:1px solid #c9c9c9;}\
div.nav ul>li>ul>li>a{border-right:solid 1px #c9c9c9;font-size:90%;}\
div.nav ul>li>ul>li.h2>a{padding:.4045em 2.427em;}\
div.nav ul>li>ul>li.h3>a{padding:.4045em 1.618em .4045em 4.045em;}\
div.nav ul>li>ul>li.h4>a{padding:.4045em 1.618em .4045em 5.663em;}\
div.nav ul>li>ul>li.h5>a{padding:.4045em 1.618em .4045em 7.281em;}\
div.nav ul>li>ul>li.h6>a{padding:.4045em 1.618em .4045em 8.899em;}\
div.nav ul,div.nav li,.breadcrumbs{margin:0!important;padding:0;list-style:none;}\
ul.breadcrumbs,.breadcrumbs li{display:inline-block;}\
.menu{display:inline-block;position:absolute;top:12px;right:20px;cursor:pointer;width:1.5em;height:1.5em;padding:16px 24px;border:solid 1px rgba(255,255,255,0.5);border-radius:5px;}\
.home{display:inline-block;max-width:16px;max-height:16px;line-height:16px;margin:0 5px 0 0;cursor:pointer;}\
h1>a,h2>a,h3>a,h4>a,h5>a,h6>a{display:none;max-width:16px;max-height:24px;margin:-8px 0 0 5px;vertical-align:middle;}\
h1:hover>a,h2:hover>a,h3:hover>a,h4:hover>a,h5:hover>a,h6:hover>a{display:inline-block;text-decoration:none!important;}\
input[type=radio]{display:none;}\
input[type=radio]:checked ~ ul{display:block;}\
.fig{margin-top:-12px;padding-bottom:12px;display:block;text-align:center;font-style:italic;}\
div.page{width:100%;padding:1.618em 3.236em;margin:auto;line-height:24px;}\
div.page ol{margin:0 0 24px 12px;padding-left:0;}div.page ul{margin:0 0 24px 24px;list-style:disc outside;padding-left:0;}\
div.pre{overflow-x:auto;margin:1px 0 24px;}div.table{overflow-x:auto;margin:0 0 24px;}\
div.info,div.hint,div.warn{padding:12px;line-height:24px;margin-bottom:24px;}\
div.info>p,div.hint>p,div.warn>p{margin:0;}\
div.info>p:first-child,div.hint>p:first-child,div.warn>p:first-child{display:block;font-weight:700;padding:2px 8px;margin:-12px -12px 8px -12px;vertical-align:middle;}\
img{border:0;}img.imgt{display:inline-block;max-height:22px!important;margin:-4px 0 0 0;vertical-align:middle;}\
img.imgl{float:left;margin:0 12px 12px 0;}img.imgr{float:right;margin:0 0 12px 12px;}\
div.imgc{text-align:center;margin:0 0 12px 0;clear:both;}img.imgc{max-width:100%;}img.imgw{width:100%;margin-bottom:12px;clear:both;}\
.btn{border-radius:2px;line-height:normal;white-space:nowrap;color:inherit;text-align:center;cursor:pointer;font-size:100%;padding:4px 12px 8px;border:1px solid rgba(0,0,0,.1);text-decoration:none;vertical-align:middle;user-select:none;}\
.prev{float:left;}.next{float:right;}\
footer{width:100%;padding:0 3.236em;}footer p{opacity:0.6;}footer small{opacity:0.5;}footer a{text-decoration:none;color:inherit;}\
@media screen and (max-width:991.98px){nav.mobile{display:block;}nav.side{display:none;}#menuchk:checked ~ nav.side{display:block;}#_m{margin-left:0;}}";

const SCRIPT_HEAD: &str = "<script>\
function m(){document.getElementById(\"menuchk\").checked=false;}\
function c(s){\
var r=document.getElementById(s);\
if(r!=undefined){\
if(r.tagName==\"INPUT\")r.checked=true;\
else document.getElementById(\"_\"+r.parentNode.getAttribute(\"rel\")).checked=true;\
}m();}\
function s(s){\
var r=document.getElementById(\"_s\"),p=document.getElementById(\"_m\").getElementsByClassName(\"page\"),n,i,j,a,b,c,d;\
if(s){\
s=s.toLowerCase();document.getElementById(\"_t\").style.display=\"none\";r.style.display=\"block\";\
while(r.firstChild)r.removeChild(r.firstChild);n=document.createElement(\"p\");n.appendChild(document.createTextNode(\"";

const SCRIPT_TAIL: &str = "\"));r.appendChild(n);\
for(i=1;i<p.length;i++){\
a=p[i].getAttribute(\"rel\");b=\"\";c=p[i].childNodes;d=p[i].getElementsByTagName(\"H1\")[0].innerText;\
for(j=1;j<c.length && c[j].className!=\"btn prev\";j++){\
if(c[j].id!=undefined&&c[j].id!=\"\"){\
a=c[j].id;d=c[j].innerText;\
}else if(a!=b&&c[j].innerText!=undefined&&c[j].innerText.toLowerCase().indexOf(s)!=-1){\
b=a;n=document.createElement(\"a\");n.appendChild(document.createTextNode(d));n.setAttribute(\"href\",\"#\"+a);n.setAttribute(\"onclick\",\"c('\"+a+\"');\");r.appendChild(n);\
}}}\
}else{\
document.getElementById(\"_t\").style.display=\"block\";r.style.display=\"none\";}}\
document.addEventListener(\"DOMContentLoaded\",function(e){var i,r,n,l;document.getElementById(\"_q\").style.display=\"inline-block\";\
if(document.location.href.indexOf(\"?\")!=-1)document.location.href=document.location.href.replace(\"?\",\"#\");else{\
r=document.querySelectorAll(\"LABEL:not(.menu)\");\
while(r.length){\
l=r[0].getAttribute(\"for\").substr(1);\
n=document.createElement(\"a\");n.appendChild(document.createTextNode(r[0].innerText));\
n.setAttribute(\"href\",\"#\"+l);n.setAttribute(\"onclick\",\"c('\"+(l!=\"\"?l:\"_\")+\"');\");\
if(r[0].getAttribute(\"class\")!=undefined)n.setAttribute(\"class\",r[0].getAttribute(\"class\"));\
if(r[0].getAttribute(\"title\")!=undefined&&l!=\"\")n.setAttribute(\"title\",r[0].getAttribute(\"title\"));\
if(r[0].getAttribute(\"accesskey\")!=undefined)n.setAttribute(\"accesskey\",r[0].getAttribute(\"accesskey\"));\
r[0].parentNode.replaceChild(n,r[0]);\
r=document.querySelectorAll(\"LABEL:not(.menu)\");\
}try{c(document.location.href.split(\"#\")[1]);}catch(e){}}});\
</script>\n";

/// Builds the complete HTML artifact around an already-generated body.
/// Resource problems (theme, title image) are reported and degraded, never
/// fatal.
pub fn render_document(result: &GenerateResult, diagnostics: &mut Vec<Diagnostic>) -> String {
    let strings = &result.strings;
    let theme = load_theme(result, diagnostics);
    let title_image = load_title_image(result, diagnostics);
    let title = if !strings.titleimg_alt.is_empty() && !strings.title.is_empty() {
        format!("{} {}", strings.titleimg_alt, strings.title)
    } else if !strings.title.is_empty() {
        strings.title.clone()
    } else if !strings.titleimg_alt.is_empty() {
        strings.titleimg_alt.clone()
    } else {
        "No name".to_string()
    };
    let pages: Vec<&TocEntry> = result.toc.iter().filter(|entry| entry.is_page()).collect();

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n");
    html.push_str(&format!("<html lang=\"{}\">\n<head>\n", strings.lang));
    html.push_str("  <meta charset=\"utf-8\">\n");
    html.push_str(&format!(
        "  <meta name=\"generator\" content=\"tagbook {VERSION}\">\n"
    ));
    html.push_str("  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    html.push_str(&format!("  <title>{}</title>\n", escape(&title)));

    html.push_str("  <style rel=\"logic\">");
    html.push_str(LOGIC_CSS);
    for page in &pages {
        html.push_str(&format!(
            "#_{0}:checked ~ nav div ul li[rel={0}]>.toc,",
            page.slug
        ));
    }
    html.push_str("div.page{display:none;}");
    for page in &pages {
        html.push_str(&format!(
            "#_{0}:checked ~ nav div ul li[rel={0}]>ul,#_{0}:checked ~ nav div ul li[rel={0}]>.current,#_{0}:checked ~ div div[rel={0}],",
            page.slug
        ));
    }
    html.push_str("#_:checked ~ div div[rel=_]{display:block;}</style>\n");
    html.push_str(&format!(
        "  <style rel=\"theme\">{}</style>\n</head>\n<body>\n  <div class=\"frame content\">\n    ",
        strip_newlines(&theme)
    ));

    let mut page_checked = result.landing;
    if result.landing {
        html.push_str("<input type=\"radio\" name=\"page\" id=\"_\" checked>");
    }
    for page in &pages {
        html.push_str(&format!(
            "<input type=\"radio\" name=\"page\" id=\"_{}\"{}>",
            page.slug,
            if page_checked { "" } else { " checked" }
        ));
        page_checked = true;
    }
    if page_checked {
        html.push('\n');
    }

    html.push_str(&format!(
        "    <input type=\"checkbox\" id=\"menuchk\" style=\"display:none;\"><nav class=\"side nav\"><div>\n      <div class=\"title\"><a href=\"{}\">",
        strings.url
    ));
    match &title_image {
        Some(image) => {
            html.push_str(&format!(
                "<img alt=\"{}\" src=\"{}\">",
                escape(&strings.titleimg_alt),
                image.src
            ));
            if !strings.title.is_empty() {
                html.push_str(&format!(" {}", strings.title));
            }
        }
        None => html.push_str(&title),
    }
    html.push_str(&format!(
        "</a><div class=\"version\">{}</div>\
<input id=\"_q\" class=\"search\" type=\"text\" required=\"required\" onkeyup=\"s(this.value);\"></div>\
      <div id=\"_s\" class=\"nav\"></div>\n      <div id=\"_t\" class=\"nav\">\n",
        strings.version
    ));

    // The sidebar: captions group, level-1 entries fold, deeper headings
    // link straight to their anchors.
    let mut depth = 0usize;
    for entry in &result.toc {
        if entry.raw_title.is_empty() {
            continue;
        }
        if entry.level == 0 {
            if depth > 1 {
                html.push_str("        </ul></li>\n");
            }
            if depth > 0 {
                html.push_str("        </ul>\n");
            }
            html.push_str(&format!("        <p>{}</p>\n", entry.raw_title));
            depth = 0;
        } else if entry.level == 1 {
            if depth == 0 {
                html.push_str("        <ul>\n");
            } else {
                html.push_str("        </ul></li>\n");
            }
            html.push_str(&format!(
                "        <li rel=\"{0}\"><label class=\"toc\" for=\"_{0}\">{1}</label><div class=\"current\">{1}</div><ul>\n",
                entry.slug, entry.raw_title
            ));
            depth = 1;
        } else {
            html.push_str(&format!(
                "          <li class=\"h{}\"><a href=\"#{}\" onclick=\"m()\">{}</a></li>\n",
                entry.level, entry.slug, entry.raw_title
            ));
            depth = entry.level as usize;
        }
    }
    if depth > 1 {
        html.push_str("        </ul></li>\n");
    }
    if depth > 0 {
        html.push_str("        </ul>\n");
    }

    html.push_str("      </div>\n    </div></nav>\n    <div id=\"_m\">\n");
    html.push_str(&format!(
        "      <nav class=\"mobile title\">{}<label for=\"menuchk\" class=\"menu\"></label></nav>\n",
        title
    ));
    html.push_str(&result.body);
    html.push_str(&format!(
        "\n      <footer><hr><p>© Copyright {}<br><small>Generated by tagbook v{}</small></p></footer>\n    </div>\n  </div>\n",
        strings.copyright, VERSION
    ));
    html.push_str(SCRIPT_HEAD);
    html.push_str(&strings.search_results);
    html.push_str(SCRIPT_TAIL);
    html.push_str("</body>\n</html>\n");
    html
}

/// Writes the finished artifact. This is one of the two genuinely fatal
/// conditions of a run, so it surfaces as a typed error instead of a
/// diagnostic.
pub fn write_document(path: &std::path::Path, html: &str) -> Result<(), crate::RenderError> {
    fs::write(path, html).map_err(|source| crate::RenderError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn load_theme(result: &GenerateResult, diagnostics: &mut Vec<Diagnostic>) -> String {
    match &result.theme {
        Some(path) => match fs::read_to_string(path) {
            Ok(css) => css,
            Err(_) => {
                diagnostics.push(Diagnostic::new(
                    path.display().to_string(),
                    0,
                    DiagnosticSeverity::Error,
                    E_RESOURCE,
                    "unable to read theme css",
                ));
                DEFAULT_THEME.to_string()
            }
        },
        None => DEFAULT_THEME.to_string(),
    }
}

fn load_title_image(
    result: &GenerateResult,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<EmbeddedImage> {
    let path = result.title_image.as_ref()?;
    match probe_image(path) {
        Ok(image) => Some(image),
        Err(_) => {
            diagnostics.push(Diagnostic::new(
                path.display().to_string(),
                0,
                DiagnosticSeverity::Error,
                E_RESOURCE,
                "unable to read title image",
            ));
            None
        }
    }
}

fn strip_newlines(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    stripped.trim_matches(' ').to_string()
}

fn escape(text: &str) -> String {
    let mut out = String::new();
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

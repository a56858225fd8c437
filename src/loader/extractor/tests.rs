use super::*;

#[test]
fn extracts_blocks_from_main_content() {
    let html = r#"
        <!DOCTYPE html>
        <html>
        <head><title> Business News | Daily </title></head>
        <body>
            <header><a href="/">Home</a> <a href="/markets">Markets</a></header>
            <nav><ul><li>Menu item</li></ul></nav>
            <main>
                <h1>Central bank holds rate</h1>
                <p>The   Monetary Policy Committee kept the
                   benchmark rate unchanged.</p>
                <ul>
                    <li>Inflation eased</li>
                    <li>Shilling stable</li>
                </ul>
                <div class="advertisement">Buy now</div>
                <script>var tracking = true;</script>
            </main>
            <footer>Copyright</footer>
        </body>
        </html>
    "#;

    let page = extract_text(html).expect("extraction should succeed");

    assert_eq!(page.title.as_deref(), Some("Business News | Daily"));
    assert_eq!(
        page.text,
        "Central bank holds rate\n\n\
         The Monetary Policy Committee kept the benchmark rate unchanged.\n\n\
         Inflation eased\n\nShilling stable"
    );
}

#[test]
fn falls_back_to_body() {
    let html = r#"
        <html><body>
            <div><h2>Tea prices</h2><p>Auction prices fell <b>three</b> percent.</p></div>
            <aside>Related stories</aside>
        </body></html>
    "#;

    let page = extract_text(html).expect("extraction should succeed");

    assert_eq!(page.title, None);
    assert_eq!(page.text, "Tea prices\n\nAuction prices fell three percent.");
}

#[test]
fn inline_elements_stay_in_one_block() {
    let html = "<article><p>Safaricom<br>shares <a href='#'>rose</a> <em>sharply</em>.</p></article>";

    let page = extract_text(html).expect("extraction should succeed");

    assert_eq!(page.text, "Safaricom shares rose sharply.");
}

#[test]
fn page_without_text_is_empty() {
    let html = "<html><head><title>Empty</title><style>p{}</style></head><body>\
                <script>1</script><nav>Links</nav></body></html>";

    let page = extract_text(html).expect("extraction should succeed");

    assert_eq!(page.title.as_deref(), Some("Empty"));
    assert!(page.text.is_empty());
}

#[test]
fn table_cells_are_separate_blocks() {
    let html = "<main><table><tr><td>NSE 20</td><td>1,850</td></tr></table></main>";

    let page = extract_text(html).expect("extraction should succeed");

    assert_eq!(page.text, "NSE 20\n\n1,850");
}

#[test]
fn front_page_keeps_every_article() {
    let html = r#"
        <html><body>
            <div>Markets</div>
            <article><h2>Shilling steadies</h2><p>The shilling held firm.</p></article>
            <article><h2>Tea prices fall</h2><p>Auction prices dropped.</p></article>
            <article><h2>Bank profits up</h2><p>Lenders reported gains.</p></article>
            <footer>Copyright</footer>
        </body></html>
    "#;

    let page = extract_text(html).expect("extraction should succeed");

    assert_eq!(
        page.text,
        "Markets\n\nShilling steadies\n\nThe shilling held firm.\n\n\
         Tea prices fall\n\nAuction prices dropped.\n\n\
         Bank profits up\n\nLenders reported gains."
    );
}

#[test]
fn articles_inside_main_use_main() {
    let html = r#"
        <html><body>
            <div class="masthead">Daily Business</div>
            <main>
                <article><p>Maize harvest rises.</p></article>
                <article><p>Port volumes slow.</p></article>
            </main>
        </body></html>
    "#;

    let page = extract_text(html).expect("extraction should succeed");

    assert_eq!(page.text, "Maize harvest rises.\n\nPort volumes slow.");
}

const INDEX_HTML: &str = include_str!("../../static/index.html");

pub fn handle_page() -> impl warp::Reply {
    warp::reply::html(INDEX_HTML)
}

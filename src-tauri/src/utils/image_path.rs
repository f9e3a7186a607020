/// 规范化图片路径：统一使用正斜杠，去掉空段和 `.` 段
///
/// 以分隔符开头的绝对路径保留一个前导 `/`；`..` 原样保留，由后端拒绝
pub fn normalize_image_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let absolute = unified.starts_with('/');

    let joined = unified
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/");

    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// 生成后端 `/images/file` 的访问地址，不发起任何请求
pub fn image_url(base_url: &str, image_path: &str) -> String {
    format!(
        "{}/images/file?path={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(&normalize_image_path(image_path))
    )
}

use crate::error::StatsError;

/// Translate a virtual-host-wrapped URL into something readable,
/// e.g. `/VirtualHostBase/http/che.engin.umich.edu:80/engin/departments/cheme/VirtualHostRoot/`
/// becomes `http://che.engin.umich.edu/`. URLs without the wrapping
/// marker pass through unchanged.
pub fn clean_url(url: &str) -> Result<String, StatsError> {
    if !url.contains("VirtualHostBase") {
        return Ok(url.to_owned());
    }

    let parts: Vec<&str> = url.split('/').collect();
    if parts.len() < 4 {
        return Err(StatsError::MalformedUrl(url.to_owned()));
    }

    let protocol = parts[2];
    let host = parts[3].split(':').next().unwrap_or(parts[3]);
    let trail = match parts.last() {
        Some(&last) if last != "VirtualHostRoot" => last,
        _ => "",
    };

    Ok(format!("{protocol}://{host}/{trail}"))
}

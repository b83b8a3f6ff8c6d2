use actix_files as fs;
use actix_web::{error, get, web, Error};
use std::path::{Component, PathBuf};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_file);
}

#[get("/static/{filename:.*}")]
async fn view_file(path: web::Path<String>) -> Result<fs::NamedFile, Error> {
    let req_path = PathBuf::from(path.into_inner());
    if req_path
        .components()
        .any(|part| !matches!(part, Component::Normal(_)))
    {
        return Err(error::ErrorNotFound("File not found."));
    }

    let mut path = PathBuf::from("public/static/");
    path.push(req_path);

    let file = fs::NamedFile::open(path).map_err(|_| error::ErrorNotFound("File not found."))?;

    Ok(file.use_last_modified(true))
}

pub mod mega_downloader;

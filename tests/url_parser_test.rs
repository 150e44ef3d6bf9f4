//! Tests for URL/ID extraction functionality.

use gconnector::url_parser::{extract_id, InvalidId};

mod drive_urls {
    use super::*;

    #[test]
    fn folder_url() {
        let url = "https://drive.google.com/drive/folders/1abc123XYZ-_def456";
        assert_eq!(extract_id(url).unwrap(), "1abc123XYZ-_def456");
    }

    #[test]
    fn folder_url_with_user_and_query() {
        let url = "https://drive.google.com/drive/u/1/folders/1abc123XYZ?usp=sharing";
        assert_eq!(extract_id(url).unwrap(), "1abc123XYZ");
    }

    #[test]
    fn file_url() {
        let url = "http://drive.google.com/file/d/1abc123XYZ/view?usp=sharing";
        assert_eq!(extract_id(url).unwrap(), "1abc123XYZ");
    }

    #[test]
    fn open_url() {
        let url = "https://drive.google.com/open?id=1abc123XYZ";
        assert_eq!(extract_id(url).unwrap(), "1abc123XYZ");
    }
}

mod docs_urls {
    use super::*;

    #[test]
    fn spreadsheet_edit_url() {
        let url = "https://docs.google.com/spreadsheets/d/1sheet_ID-x/edit#gid=12345";
        assert_eq!(extract_id(url).unwrap(), "1sheet_ID-x");
    }

    #[test]
    fn spreadsheet_url_with_user() {
        let url = "https://docs.google.com/spreadsheets/u/0/d/1sheetID/edit";
        assert_eq!(extract_id(url).unwrap(), "1sheetID");
    }

    #[test]
    fn document_url() {
        let url = "https://docs.google.com/document/d/1docID/edit";
        assert_eq!(extract_id(url).unwrap(), "1docID");
    }
}

mod raw_ids {
    use super::*;

    #[test]
    fn id_with_mixed_special() {
        assert_eq!(extract_id("abc-123_XYZ").unwrap(), "abc-123_XYZ");
    }

    #[test]
    fn id_with_whitespace_trimmed() {
        assert_eq!(extract_id("\t1abc123XYZ\n").unwrap(), "1abc123XYZ");
    }
}

mod invalid_inputs {
    use super::*;

    #[test]
    fn whitespace_only() {
        assert_eq!(extract_id("   "), Err(InvalidId("   ".to_string())));
    }

    #[test]
    fn foreign_url() {
        assert!(extract_id("https://example.com/folder/123").is_err());
    }

    #[test]
    fn malformed_drive_url() {
        assert!(extract_id("https://drive.google.com/drive/").is_err());
    }

    #[test]
    fn invalid_characters_in_id() {
        assert!(extract_id("abc 123").is_err());
        assert!(extract_id("abc/123").is_err());
    }

    #[test]
    fn error_mentions_input() {
        let err = extract_id("abc@123").unwrap_err();
        assert!(err.to_string().contains("abc@123"));
    }
}

//! S3 XML response builders
//!
//! Documents are assembled into a single string buffer. `pretty` controls
//! newlines and two-space indentation; the namespace comes from the
//! configured S3 API version.

use chrono::{DateTime, Utc};

/// Escape special XML characters
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Timestamp format used in listing and copy documents.
pub fn xml_timestamp(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Incremental document writer shared by all response builders.
struct XmlDoc {
    buf: String,
    pretty: bool,
    depth: usize,
}

impl XmlDoc {
    fn new(pretty: bool) -> Self {
        Self {
            buf: String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#),
            pretty,
            depth: 0,
        }
    }

    fn line_start(&mut self) {
        if self.pretty {
            self.buf.push('\n');
            for _ in 0..self.depth {
                self.buf.push_str("  ");
            }
        }
    }

    fn open_root(&mut self, tag: &str, xmlns: &str) {
        self.line_start();
        self.buf
            .push_str(&format!(r#"<{tag} xmlns="{xmlns}">"#));
        self.depth += 1;
    }

    fn open(&mut self, tag: &str) {
        self.line_start();
        self.buf.push_str(&format!("<{tag}>"));
        self.depth += 1;
    }

    fn open_attrs(&mut self, tag: &str, attrs: &str) {
        self.line_start();
        self.buf.push_str(&format!("<{tag} {attrs}>"));
        self.depth += 1;
    }

    fn close(&mut self, tag: &str) {
        self.depth -= 1;
        self.line_start();
        self.buf.push_str(&format!("</{tag}>"));
    }

    fn leaf(&mut self, tag: &str, text: &str) {
        self.line_start();
        self.buf
            .push_str(&format!("<{tag}>{}</{tag}>", escape_xml(text)));
    }

    fn leaf_empty(&mut self, tag: &str) {
        self.line_start();
        self.buf.push_str(&format!("<{tag}/>"));
    }

    fn finish(mut self, root: &str) -> String {
        self.close(root);
        self.buf
    }

    fn owner(&mut self, tag: &str, owner: &Owner) {
        self.open(tag);
        self.leaf("ID", &owner.id);
        self.leaf("DisplayName", &owner.display_name);
        self.close(tag);
    }
}

/// Owner identity used across listing and ACL documents.
#[derive(Debug, Clone)]
pub struct Owner {
    pub id: String,
    pub display_name: String,
}

impl Owner {
    pub fn new(user: &str) -> Self {
        Self {
            id: user.to_string(),
            display_name: user.to_string(),
        }
    }
}

/// Bucket entry for ListBuckets
#[derive(Debug, Clone)]
pub struct BucketInfo {
    pub name: String,
    pub creation_date: DateTime<Utc>,
}

/// ListBuckets response
#[derive(Debug, Clone)]
pub struct ListAllMyBucketsResult {
    pub owner: Owner,
    pub buckets: Vec<BucketInfo>,
}

impl ListAllMyBucketsResult {
    pub fn to_xml(&self, xmlns: &str, pretty: bool) -> String {
        let mut doc = XmlDoc::new(pretty);
        doc.open_root("ListAllMyBucketsResult", xmlns);
        doc.owner("Owner", &self.owner);
        doc.open("Buckets");
        for bucket in &self.buckets {
            doc.open("Bucket");
            doc.leaf("Name", &bucket.name);
            doc.leaf("CreationDate", &xml_timestamp(&bucket.creation_date));
            doc.close("Bucket");
        }
        doc.close("Buckets");
        doc.finish("ListAllMyBucketsResult")
    }
}

/// Object entry in a ListObjects response
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub key: String,
    pub last_modified: DateTime<Utc>,
    /// Listings report an empty ETag; the store does not expose MD5s in
    /// directory entries.
    pub etag: String,
    pub size: u64,
    pub storage_class: String,
}

/// ListObjects response
#[derive(Debug, Clone)]
pub struct ListBucketResult {
    pub name: String,
    pub prefix: String,
    pub marker: String,
    pub max_keys: u64,
    pub is_truncated: bool,
    pub contents: Vec<ObjectEntry>,
    pub common_prefixes: Vec<String>,
    pub owner: Owner,
}

impl ListBucketResult {
    /// An empty listing, used when the prefix is unrepresentable.
    pub fn empty(name: String, prefix: String, max_keys: u64, owner: Owner) -> Self {
        Self {
            name,
            prefix,
            marker: String::new(),
            max_keys,
            is_truncated: false,
            contents: Vec::new(),
            common_prefixes: Vec::new(),
            owner,
        }
    }

    pub fn to_xml(&self, xmlns: &str, pretty: bool) -> String {
        let mut doc = XmlDoc::new(pretty);
        doc.open_root("ListBucketResult", xmlns);
        doc.leaf("Name", &self.name);
        doc.leaf("Prefix", &self.prefix);
        doc.leaf("Marker", &self.marker);
        doc.leaf("MaxKeys", &self.max_keys.to_string());
        doc.leaf("Delimiter", "/");
        doc.leaf("IsTruncated", if self.is_truncated { "true" } else { "false" });

        for entry in &self.contents {
            doc.open("Contents");
            doc.leaf("Key", &entry.key);
            doc.leaf("LastModified", &xml_timestamp(&entry.last_modified));
            doc.leaf("ETag", &entry.etag);
            doc.leaf("Size", &entry.size.to_string());
            doc.owner("Owner", &self.owner);
            doc.leaf("StorageClass", &entry.storage_class);
            doc.close("Contents");
        }

        for prefix in &self.common_prefixes {
            doc.open("CommonPrefixes");
            doc.leaf("Prefix", prefix);
            doc.close("CommonPrefixes");
        }

        doc.finish("ListBucketResult")
    }
}

/// CopyObject response
#[derive(Debug, Clone)]
pub struct CopyObjectResult {
    pub etag: String,
    pub last_modified: DateTime<Utc>,
}

impl CopyObjectResult {
    pub fn to_xml(&self, xmlns: &str, pretty: bool) -> String {
        let mut doc = XmlDoc::new(pretty);
        doc.open_root("CopyObjectResult", xmlns);
        doc.leaf("LastModified", &xml_timestamp(&self.last_modified));
        doc.leaf("ETag", &self.etag);
        doc.finish("CopyObjectResult")
    }
}

/// Fixed ACL response: the store user holds FULL_CONTROL, always.
#[derive(Debug, Clone)]
pub struct AccessControlPolicy {
    pub owner: Owner,
}

impl AccessControlPolicy {
    pub fn to_xml(&self, xmlns: &str, pretty: bool) -> String {
        let mut doc = XmlDoc::new(pretty);
        doc.open_root("AccessControlPolicy", xmlns);
        doc.owner("Owner", &self.owner);
        doc.open("AccessControlList");
        doc.open("Grant");
        doc.open_attrs(
            "Grantee",
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:type="CanonicalUser""#,
        );
        doc.leaf("ID", &self.owner.id);
        doc.leaf("DisplayName", &self.owner.display_name);
        doc.close("Grantee");
        doc.leaf("Permission", "FULL_CONTROL");
        doc.close("Grant");
        doc.close("AccessControlList");
        doc.finish("AccessControlPolicy")
    }
}

/// Fixed ListMultipartUploads response: always empty.
#[derive(Debug, Clone)]
pub struct ListMultipartUploadsResult {
    pub bucket: String,
}

impl ListMultipartUploadsResult {
    pub fn to_xml(&self, xmlns: &str, pretty: bool) -> String {
        let mut doc = XmlDoc::new(pretty);
        doc.open_root("ListMultipartUploadsResult", xmlns);
        doc.leaf("Bucket", &self.bucket);
        doc.leaf_empty("KeyMarker");
        doc.leaf_empty("UploadIdMarker");
        doc.leaf("MaxUploads", "1000");
        doc.leaf("IsTruncated", "false");
        doc.finish("ListMultipartUploadsResult")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const NS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 4, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a<b>c"), "a&lt;b&gt;c");
        assert_eq!(escape_xml("a&b"), "a&amp;b");
    }

    #[test]
    fn list_buckets_document() {
        let result = ListAllMyBucketsResult {
            owner: Owner::new("storage"),
            buckets: vec![BucketInfo {
                name: "b1".to_string(),
                creation_date: ts(),
            }],
        };
        let xml = result.to_xml(NS, true);
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"<ListAllMyBucketsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">"#));
        assert!(xml.contains("<Name>b1</Name>"));
        assert!(xml.contains("<CreationDate>2024-05-04T12:00:00.000Z</CreationDate>"));
        assert!(xml.contains("<DisplayName>storage</DisplayName>"));
    }

    #[test]
    fn compact_output_has_no_newlines() {
        let result = ListAllMyBucketsResult {
            owner: Owner::new("storage"),
            buckets: Vec::new(),
        };
        let xml = result.to_xml(NS, false);
        assert!(!xml.contains('\n'));
        assert!(xml.contains("<Buckets></Buckets>"));
    }

    #[test]
    fn list_objects_document() {
        let result = ListBucketResult {
            name: "b1".to_string(),
            prefix: "a/".to_string(),
            marker: String::new(),
            max_keys: 1000,
            is_truncated: false,
            contents: vec![ObjectEntry {
                key: "a/x".to_string(),
                last_modified: ts(),
                etag: String::new(),
                size: 5,
                storage_class: "STANDARD".to_string(),
            }],
            common_prefixes: vec!["a/sub/".to_string()],
            owner: Owner::new("storage"),
        };
        let xml = result.to_xml(NS, true);
        assert!(xml.contains("<Key>a/x</Key>"));
        assert!(xml.contains("<Size>5</Size>"));
        assert!(xml.contains("<Delimiter>/</Delimiter>"));
        assert!(xml.contains("<StorageClass>STANDARD</StorageClass>"));
        assert!(xml.contains("<Prefix>a/sub/</Prefix>"));
        assert!(xml.contains("<IsTruncated>false</IsTruncated>"));
    }

    #[test]
    fn copy_object_document() {
        let xml = CopyObjectResult {
            etag: "\"5d41402abc4b2a76b9719d911017c592\"".to_string(),
            last_modified: ts(),
        }
        .to_xml(NS, true);
        assert!(xml.contains("<ETag>&quot;5d41402abc4b2a76b9719d911017c592&quot;</ETag>"));
        assert!(xml.contains("<LastModified>2024-05-04T12:00:00.000Z</LastModified>"));
    }

    #[test]
    fn acl_document_grants_full_control() {
        let xml = AccessControlPolicy {
            owner: Owner::new("storage"),
        }
        .to_xml(NS, true);
        assert!(xml.contains("<Permission>FULL_CONTROL</Permission>"));
        assert!(xml.contains(r#"xsi:type="CanonicalUser""#));
    }

    #[test]
    fn multipart_listing_is_empty() {
        let xml = ListMultipartUploadsResult {
            bucket: "b1".to_string(),
        }
        .to_xml(NS, true);
        assert!(xml.contains("<MaxUploads>1000</MaxUploads>"));
        assert!(xml.contains("<IsTruncated>false</IsTruncated>"));
        assert!(xml.contains("<KeyMarker/>"));
    }
}

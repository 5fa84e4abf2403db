//! Property tests through the service facade.

use bytes::Bytes;
use proptest::prelude::*;
use tokio::runtime::Runtime;

use lockbox::{Upload, UploadMetadata, HEADER_FILE_METADATA};
use lockbox_testkit::generators::{filename, payload, upload_metadata};
use lockbox_testkit::TestFixture;

fn header<'a>(headers: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.as_str())
}

#[test]
fn uploads_stay_under_upload_dir_and_return_metadata_verbatim() {
    let rt = Runtime::new().unwrap();
    let fixture = TestFixture::new();
    let alice = rt.block_on(fixture.register("alice")).unwrap();
    let bearer = alice.bearer();

    proptest!(ProptestConfig::with_cases(32), |(
        name in filename(),
        metadata in upload_metadata(),
        content in payload(256),
    )| {
        prop_assume!(!name.trim().is_empty());

        let file = rt
            .block_on(fixture.lockbox.upload(
                Some(&bearer),
                Upload {
                    filename: name.clone(),
                    content: Bytes::from(content.clone()),
                    metadata: metadata.clone(),
                },
            ))
            .unwrap();

        let stored_name = file.storage_path.strip_prefix("uploads/").unwrap_or("");
        prop_assert!(!stored_name.is_empty());
        prop_assert!(!stored_name.contains('/'));
        prop_assert!(!stored_name.contains(".."));
        prop_assert_eq!(file.filename.as_str(), name.trim());

        let download = rt
            .block_on(fixture.lockbox.download(Some(&bearer), &file.id))
            .unwrap();
        prop_assert_eq!(&download.content[..], &content[..]);

        let headers = download.headers();
        let sent = header(&headers, HEADER_FILE_METADATA).unwrap_or("");
        prop_assert_eq!(sent, metadata.to_json().unwrap());
        prop_assert_eq!(UploadMetadata::from_json(sent).unwrap(), metadata);
    });
}
